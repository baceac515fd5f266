// 8.0.2: result types and errors for pool operations.

use crate::amm::SwapError;
use crate::fp96::{Fp96, MathError};
use crate::insurance::InsuranceFunds;
use crate::oracle::OracleError;
use crate::position::{Coefficients, DiscountedTotals};
use crate::risk::{Leverage, RiskError};
use crate::tokens::TokenError;
use crate::types::{AccountId, Asset, PoolMode, PositionType, Timestamp};
use serde::{Deserialize, Serialize};

/// What happened to a trading request. the implicit reinit may margin call the caller first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Executed(T),
    MarginCalled,
}

impl<T> Outcome<T> {
    pub fn into_executed(self) -> Option<T> {
        match self {
            Outcome::Executed(value) => Some(value),
            Outcome::MarginCalled => None,
        }
    }

    pub fn is_margin_called(&self) -> bool {
        matches!(self, Outcome::MarginCalled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeResult {
    pub account: AccountId,
    pub kind: PositionType,
    pub base_amount: u128,
    pub quote_amount: u128,
    pub fee: u128,
    // quote per base actually paid or received
    pub execution_price: Fp96,
    pub leverage: Leverage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseResult {
    pub account: AccountId,
    pub collateral_sold: u128,
    pub debt_repaid: u128,
    pub fee: u128,
    // Lend if collateral is left, Uninitialized otherwise
    pub remaining: PositionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginCallResult {
    pub account: AccountId,
    pub kind: PositionType,
    pub collateral_sold: u128,
    pub debt_repaid: u128,
    pub surplus: u128,
    pub bad_debt: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReinitReport {
    pub elapsed_secs: u64,
    pub margin_calls: Vec<MarginCallResult>,
    // a callable position was left for the next reinit
    pub pending: bool,
    /// Callable positions whose collateral is lent out. they stay open until liquidity returns.
    pub deferred: Vec<AccountId>,
}

impl ReinitReport {
    pub fn margin_called(&self, account: AccountId) -> bool {
        self.margin_calls.iter().any(|call| call.account == account)
    }
}

/// Consistent copy of the aggregate pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub mode: PoolMode,
    pub time: Timestamp,
    pub last_reinit: Timestamp,
    pub coefficients: Coefficients,
    pub totals: DiscountedTotals,
    pub base_holdings: u128,
    pub quote_holdings: u128,
    pub insurance: InsuranceFunds,
    pub emergency_withdraw_coeff: Fp96,
    pub positions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool is still solvent, shutdown not allowed")]
    NotEligibleForShutdown,

    #[error("pool is already in emergency mode")]
    AlreadyInEmergency,

    #[error("pool is in emergency mode")]
    EmergencyMode,

    #[error("pool is not in emergency mode")]
    NotInEmergency,

    #[error("short positions cannot withdraw in short emergency")]
    ShortEmergency,

    #[error("long positions cannot withdraw in long emergency")]
    LongEmergency,

    #[error("pool lacks {asset} liquidity")]
    InsufficientLiquidity { asset: Asset },

    #[error("position of {account} is {kind:?}, not valid here")]
    InvalidPosition { account: AccountId, kind: PositionType },

    #[error("{account} has no position")]
    UninitializedPosition { account: AccountId },

    #[error("{account} already has a position")]
    PositionInitialized { account: AccountId },

    #[error("{account} is not margin callable")]
    NotLiquidatable { account: AccountId },

    #[error("{asset} is owed by the position and cannot be withdrawn")]
    DebtAssetWithdrawal { asset: Asset },

    #[error("amount {amount} below minimum {minimum}")]
    LessThanMinimum { amount: u128, minimum: u128 },

    #[error("{asset} collateral would exceed pool limit {limit}")]
    ExceedsLimit { asset: Asset, limit: u128 },

    #[error("execution price {price} beyond limit {limit}")]
    LimitPriceViolated { price: Fp96, limit: Fp96 },

    #[error("execution price {price} too far from oracle price {oracle}")]
    SlippageExceeded { price: Fp96, oracle: Fp96 },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("liquidator and target are the same account")]
    SelfLiquidation,

    #[error("collateral of {account} cannot repay its debt")]
    InsufficientCollateral { account: AccountId },

    #[error("risk: {0}")]
    Risk(#[from] RiskError),

    #[error("math: {0}")]
    Math(#[from] MathError),

    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("swap: {0}")]
    Swap(#[from] SwapError),

    #[error("token: {0}")]
    Token(#[from] TokenError),
}

impl PoolError {
    /// Short revert-style code.
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::NotEligibleForShutdown => "NE",
            PoolError::AlreadyInEmergency => "EM",
            PoolError::EmergencyMode => "EM",
            PoolError::NotInEmergency => "NEM",
            PoolError::ShortEmergency => "SE",
            PoolError::LongEmergency => "LE",
            PoolError::InsufficientLiquidity { .. } => "NL",
            PoolError::InvalidPosition { .. } => "WPT",
            PoolError::UninitializedPosition { .. } => "U",
            PoolError::PositionInitialized { .. } => "PI",
            PoolError::NotLiquidatable { .. } => "NML",
            PoolError::DebtAssetWithdrawal { .. } => "WDA",
            PoolError::LessThanMinimum { .. } => "LA",
            PoolError::ExceedsLimit { .. } => "EL",
            PoolError::LimitPriceViolated { .. } => "PL",
            PoolError::SlippageExceeded { .. } => "SL",
            PoolError::ZeroAmount => "ZA",
            PoolError::SelfLiquidation => "SLF",
            PoolError::InsufficientCollateral { .. } => "IC",
            PoolError::Risk(RiskError::LeverageExceeded { .. }) => "ML",
            PoolError::Risk(RiskError::Math(_)) | PoolError::Math(_) => "MATH",
            PoolError::Oracle(_) => "OR",
            PoolError::Swap(_) => "SW",
            PoolError::Token(_) => "TK",
        }
    }

    pub fn is_insolvency(&self) -> bool {
        matches!(self, PoolError::InsufficientLiquidity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(PoolError::NotEligibleForShutdown.code(), "NE");
        assert_eq!(PoolError::AlreadyInEmergency.code(), "EM");
        assert_eq!(PoolError::ShortEmergency.code(), "SE");
        assert_eq!(PoolError::LongEmergency.code(), "LE");
        let risk = RiskError::LeverageExceeded { leverage: Leverage::Underwater, max: rust_decimal::Decimal::TEN };
        assert_eq!(PoolError::from(risk).code(), "ML");
    }

    #[test]
    fn outcome_helpers() {
        assert_eq!(Outcome::Executed(5u128).into_executed(), Some(5));
        assert!(Outcome::<u128>::MarginCalled.is_margin_called());
        assert_eq!(Outcome::<u128>::MarginCalled.into_executed(), None);
    }
}
