// 7.0 config.rs: all pool policy in one place. leverage ceilings, rate curve, fees, slippage, limits.
// 7.1 values are human decimals here; the engine converts them to Q96 when it needs them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::fp96::{Fp96, MathError};
use crate::types::{Asset, Timestamp};

/** 7.2: kinked utilization curve. annual rates. */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCurve {
    pub base_rate: Decimal,
    // added linearly from 0 to optimal utilization
    pub slope1: Decimal,
    // added linearly from optimal to full utilization
    pub slope2: Decimal,
    pub optimal_utilization: Decimal,
    pub max_rate: Decimal,
}

impl Default for RateCurve {
    fn default() -> Self {
        Self {
            base_rate: dec!(0.01),
            slope1: dec!(0.04),
            slope2: dec!(0.75),
            optimal_utilization: dec!(0.8),
            max_rate: dec!(1.0),
        }
    }
}

impl RateCurve {
    pub fn flat(rate: Decimal) -> Self {
        Self {
            base_rate: rate,
            slope1: Decimal::ZERO,
            slope2: Decimal::ZERO,
            optimal_utilization: dec!(0.8),
            max_rate: rate,
        }
    }

    // utilization is clamped to [0, 1]
    pub fn annual_rate(&self, utilization: Decimal) -> Decimal {
        let u = utilization.max(Decimal::ZERO).min(Decimal::ONE);
        let rate = if u <= self.optimal_utilization {
            self.base_rate + u * self.slope1 / self.optimal_utilization
        } else {
            let excess = (u - self.optimal_utilization) / (Decimal::ONE - self.optimal_utilization);
            self.base_rate + self.slope1 + excess * self.slope2
        };
        rate.min(self.max_rate)
    }
}

/** 7.3: pool risk and fee parameters. */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParams {
    // ceiling for opening or increasing a position
    pub max_leverage: Decimal,
    // positions at or above this are margin called
    pub margin_call_leverage: Decimal,
    // annual protocol fee charged on top of interest, paid to insurance
    pub fee: Decimal,
    // fraction of swapped notional charged on long/short/close
    pub swap_fee: Decimal,
    // max execution price deviation from the oracle for user trades
    pub position_slippage: Decimal,
    // max execution price deviation for margin call and shutdown swaps
    pub mc_slippage: Decimal,
    // smallest deposit that may open a position, and smallest trade
    #[serde(with = "amount")]
    pub position_min_amount: u128,
    // cap on total real collateral per asset
    #[serde(with = "amount")]
    pub base_limit: u128,
    #[serde(with = "amount")]
    pub quote_limit: u128,
    // 0 means spot
    pub twap_window_secs: u64,
    pub max_margin_calls_per_reinit: usize,
    // tables go after plain values in toml
    pub interest_rate_curve: RateCurve,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            max_leverage: dec!(20),
            margin_call_leverage: dec!(20),
            fee: dec!(0.01),
            swap_fee: dec!(0.001),
            position_slippage: dec!(0.05),
            mc_slippage: dec!(0.1),
            position_min_amount: 1,
            base_limit: u128::MAX,
            quote_limit: u128::MAX,
            twap_window_secs: 900,
            max_margin_calls_per_reinit: 4,
            interest_rate_curve: RateCurve::default(),
        }
    }
}

impl PoolParams {
    pub fn max_leverage_fp(&self) -> Result<Fp96, MathError> {
        Fp96::from_decimal(self.max_leverage)
    }

    pub fn margin_call_leverage_fp(&self) -> Result<Fp96, MathError> {
        Fp96::from_decimal(self.margin_call_leverage)
    }

    pub fn limit_for(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Base => self.base_limit,
            Asset::Quote => self.quote_limit,
            Asset::Native => 0,
        }
    }
}

// toml integers stop at i64, token amounts travel as strings
mod amount {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(u128::from(value)),
            Raw::Str(raw) => raw.parse().map_err(D::Error::custom),
        }
    }
}

// Token metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub base_symbol: String,
    pub quote_symbol: String,
    pub base_decimals: u32,
    pub quote_decimals: u32,
    // which pool token, if any, is the wrapped native currency
    pub wrapped_native: Option<Asset>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            base_symbol: "WETH".to_string(),
            quote_symbol: "USDC".to_string(),
            base_decimals: 18,
            quote_decimals: 6,
            wrapped_native: Some(Asset::Base),
        }
    }
}

// The complete pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub start_time: Timestamp,
    pub tokens: TokenConfig,
    pub params: PoolParams,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            start_time: Timestamp::from_secs(0),
            tokens: TokenConfig::default(),
            params: PoolParams::default(),
        }
    }
}

impl PoolConfig {
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.params.max_leverage = dec!(5);
        config.params.margin_call_leverage = dec!(8);
        config.params.position_slippage = dec!(0.02);
        config.params.mc_slippage = dec!(0.05);
        config.params.twap_window_secs = 1_800;
        config
    }

    pub fn aggressive() -> Self {
        let mut config = Self::default();
        config.params.max_leverage = dec!(50);
        config.params.margin_call_leverage = dec!(60);
        config.params.fee = dec!(0.02);
        config.params.twap_window_secs = 300;
        config.params.max_margin_calls_per_reinit = 8;
        config
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse { reason: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse { reason: e.to_string() })
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.params;

        if p.max_leverage <= Decimal::ONE {
            return Err(ConfigError::InvalidLeverage {
                reason: "max leverage must be above 1".to_string(),
            });
        }
        if p.margin_call_leverage < p.max_leverage {
            return Err(ConfigError::InvalidLeverage {
                reason: "margin call leverage must not be below max leverage".to_string(),
            });
        }

        let curve = &p.interest_rate_curve;
        if curve.optimal_utilization <= Decimal::ZERO || curve.optimal_utilization >= Decimal::ONE {
            return Err(ConfigError::InvalidRateCurve {
                reason: "kink must be strictly between 0 and 1".to_string(),
            });
        }
        if curve.base_rate < Decimal::ZERO
            || curve.slope1 < Decimal::ZERO
            || curve.slope2 < Decimal::ZERO
            || curve.max_rate < curve.base_rate
        {
            return Err(ConfigError::InvalidRateCurve {
                reason: "rates must be non negative and max rate at least the base rate".to_string(),
            });
        }

        if p.fee < Decimal::ZERO || p.swap_fee < Decimal::ZERO || p.swap_fee >= Decimal::ONE {
            return Err(ConfigError::InvalidFees {
                reason: "fees must be non negative and swap fee below 100%".to_string(),
            });
        }

        for slippage in [p.position_slippage, p.mc_slippage] {
            if slippage < Decimal::ZERO || slippage >= Decimal::ONE {
                return Err(ConfigError::InvalidSlippage {
                    reason: "slippage must be in [0, 1)".to_string(),
                });
            }
        }

        if p.max_margin_calls_per_reinit == 0 {
            return Err(ConfigError::InvalidParams {
                reason: "at least one margin call per reinit".to_string(),
            });
        }

        if self.tokens.wrapped_native == Some(Asset::Native) {
            return Err(ConfigError::InvalidParams {
                reason: "wrapped native must be the base or quote token".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid leverage: {reason}")]
    InvalidLeverage { reason: String },

    #[error("invalid rate curve: {reason}")]
    InvalidRateCurve { reason: String },

    #[error("invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("invalid slippage: {reason}")]
    InvalidSlippage { reason: String },

    #[error("invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("cannot parse config: {reason}")]
    Parse { reason: String },

    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Conservative,
    Aggressive,
}

impl Environment {
    pub fn config(&self) -> PoolConfig {
        match self {
            Environment::Development => PoolConfig::default(),
            Environment::Conservative => PoolConfig::conservative(),
            Environment::Aggressive => PoolConfig::aggressive(),
        }
    }
}
