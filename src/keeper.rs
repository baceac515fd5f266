//! Liquidation keeper.
//!
//! Takes over margin-callable positions through `receive_position`, pays the
//! debt out of its own wallet, withdraws the collateral it received and sells
//! it through a router. The pool side is final once `receive_position`
//! returns; the router swap afterwards only moves the keeper's own tokens.

use crate::amm::{SwapError, SwapVenue};
use crate::engine::{MarginPool, Outcome, PoolError};
use crate::oracle::PriceOracle;
use crate::router::{SwapCallData, SwapRouter};
use crate::tokens::TokenError;
use crate::types::{AccountId, Asset, SwapDirection};
use log::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeeperError {
    #[error("{account} has no leveraged position")]
    NothingToLiquidate { account: AccountId },

    #[error("expected profit {expected} below minimum {minimum}")]
    InsufficientProfit { expected: u128, minimum: u128 },

    #[error("pool: {0}")]
    Pool(#[from] PoolError),

    #[error("swap: {0}")]
    Swap(#[from] SwapError),

    #[error("token: {0}")]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationReport {
    pub target: AccountId,
    pub debt_asset: Asset,
    pub repaid: u128,
    pub collateral_received: u128,
    pub proceeds: u128,
    pub profit: u128,
}

#[derive(Debug, Clone)]
pub struct LiquidationKeeper {
    pub account: AccountId,
    // in units of the target's debt asset
    pub min_profit: u128,
    pub call_data: SwapCallData,
}

impl LiquidationKeeper {
    pub fn new(account: AccountId, min_profit: u128, call_data: SwapCallData) -> Self {
        Self {
            account,
            min_profit,
            call_data,
        }
    }

    pub fn liquidate<V, R>(
        &self,
        pool: &mut MarginPool<V>,
        router: &mut SwapRouter<R>,
        target: AccountId,
    ) -> Result<LiquidationReport, KeeperError>
    where
        V: PriceOracle + SwapVenue + Clone,
        R: SwapVenue,
    {
        let real = pool.preview_real_position(target)?;
        let position = pool.position(target);
        let Some(collateral_asset) = position.collateral_asset() else {
            return Err(KeeperError::NothingToLiquidate { account: target });
        };
        let debt_asset = collateral_asset.other();
        let debt = real.debt(debt_asset);
        let collateral = real.collateral(collateral_asset);
        let direction = match collateral_asset {
            Asset::Quote => SwapDirection::QuoteToBase,
            _ => SwapDirection::BaseToQuote,
        };

        // check the trade pays before touching the pool
        let minimum = debt.saturating_add(self.min_profit);
        let estimate = router.estimate_exact_input(self.call_data, direction, collateral)?;
        if estimate < minimum {
            return Err(KeeperError::InsufficientProfit {
                expected: estimate.saturating_sub(debt),
                minimum: self.min_profit,
            });
        }

        let (quote_amount, base_amount) = match debt_asset {
            Asset::Quote => (debt, 0),
            _ => (0, debt),
        };
        pool.receive_position(self.account, target, quote_amount, base_amount)?;

        let received = match pool.withdraw(self.account, collateral_asset, u128::MAX, false)? {
            Outcome::Executed(amount) => amount,
            Outcome::MarginCalled => 0,
        };

        pool.wallets_mut().debit(self.account, collateral_asset, received)?;
        let now = pool.time();
        let proceeds = match router.route_exact_input(now, self.call_data, direction, received, minimum) {
            Ok(out) => out,
            Err(err) => {
                // the keeper keeps the collateral, the pool already settled
                pool.wallets_mut().credit(self.account, collateral_asset, received)?;
                return Err(err.into());
            }
        };
        pool.wallets_mut().credit(self.account, debt_asset, proceeds)?;

        let profit = proceeds.saturating_sub(debt);
        info!("keeper {} liquidated {}: repaid {} {}, profit {}", self.account, target, debt, debt_asset, profit);
        Ok(LiquidationReport {
            target,
            debt_asset,
            repaid: debt,
            collateral_received: received,
            proceeds,
            profit,
        })
    }
}
