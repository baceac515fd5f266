//! Risk engine.
//!
//! Leverage is never stored. It is recomputed from discounted balances, the
//! current coefficients and the oracle price every time a decision depends on
//! it: opening or growing a position, withdrawing collateral, and the
//! margin-call scan.
//!
//! Long leverage is `base * price / (base * price - quote_debt)`; short
//! leverage is `quote / (quote - base_debt * price)`. A position whose debt is
//! worth at least its collateral is underwater and has no finite leverage.

use crate::fp96::{Fp96, MathError};
use crate::position::{Coefficients, DiscountedTotals, RealPosition};
use crate::types::{Asset, PositionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leverage {
    /// No debt.
    Unlevered,
    Finite(Fp96),
    /// Debt worth at least the collateral.
    Underwater,
}

impl Leverage {
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Leverage::Unlevered => Some(Decimal::ONE),
            Leverage::Finite(value) => Some(value.to_decimal()),
            Leverage::Underwater => None,
        }
    }

    pub fn exceeds(&self, limit: Fp96) -> bool {
        match self {
            Leverage::Unlevered => false,
            Leverage::Finite(value) => *value > limit,
            Leverage::Underwater => true,
        }
    }

    pub fn at_least(&self, limit: Fp96) -> bool {
        match self {
            Leverage::Unlevered => false,
            Leverage::Finite(value) => *value >= limit,
            Leverage::Underwater => true,
        }
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leverage::Unlevered => write!(f, "1x"),
            Leverage::Finite(value) => write!(f, "{}x", value.to_decimal().round_dp(4)),
            Leverage::Underwater => write!(f, "underwater"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskError {
    #[error("leverage {leverage} exceeds max {max}x")]
    LeverageExceeded { leverage: Leverage, max: Decimal },

    #[error("risk math: {0}")]
    Math(#[from] MathError),
}

/// collateral / (collateral - debt), both in the same unit.
pub fn leverage_from_values(collateral_value: u128, debt_value: u128) -> Result<Leverage, MathError> {
    if debt_value == 0 {
        return Ok(Leverage::Unlevered);
    }
    if collateral_value <= debt_value {
        return Ok(Leverage::Underwater);
    }
    Ok(Leverage::Finite(Fp96::from_ratio(
        collateral_value,
        collateral_value - debt_value,
    )?))
}

pub fn position_leverage(real: &RealPosition, price: Fp96) -> Result<Leverage, MathError> {
    match real.kind {
        PositionType::Long => {
            let collateral_value = price.mul_amount(real.base_collateral)?;
            leverage_from_values(collateral_value, real.quote_debt)
        }
        PositionType::Short => {
            let debt_value = price.mul_amount_up(real.base_debt)?;
            leverage_from_values(real.quote_collateral, debt_value)
        }
        PositionType::Lend | PositionType::Uninitialized => Ok(Leverage::Unlevered),
    }
}

// 6.0: aggregate leverage of one side. all base collateral backs long debt, all quote backs short debt.
pub fn system_leverage(
    side: PositionType,
    totals: &DiscountedTotals,
    coeffs: &Coefficients,
    price: Fp96,
) -> Result<Leverage, MathError> {
    match side {
        PositionType::Long => {
            let collateral = coeffs.real_collateral(Asset::Base, totals.base_collateral)?;
            let debt = coeffs.real_debt(Asset::Quote, totals.quote_debt)?;
            leverage_from_values(price.mul_amount(collateral)?, debt)
        }
        PositionType::Short => {
            let collateral = coeffs.real_collateral(Asset::Quote, totals.quote_collateral)?;
            let debt = coeffs.real_debt(Asset::Base, totals.base_debt)?;
            leverage_from_values(collateral, price.mul_amount_up(debt)?)
        }
        _ => Ok(Leverage::Unlevered),
    }
}

pub fn ensure_within(leverage: Leverage, max: Fp96) -> Result<(), RiskError> {
    if leverage.exceeds(max) {
        return Err(RiskError::LeverageExceeded {
            leverage,
            max: max.to_decimal(),
        });
    }
    Ok(())
}

pub fn is_margin_callable(leverage: Leverage, threshold: Fp96) -> bool {
    leverage.at_least(threshold)
}
