// 8.2 engine/accrual.rs: reinit. accrue interest to now, then work the margin call queues.

use super::core::MarginPool;
use super::results::{PoolError, ReinitReport};
use crate::amm::SwapVenue;
use crate::config::RateCurve;
use crate::events::{EventPayload, ReinitEvent};
use crate::interest::compute_side_accrual;
use crate::oracle::PriceOracle;
use crate::types::{AccountId, Asset};
use rust_decimal::Decimal;

impl<V: PriceOracle + SwapVenue + Clone> MarginPool<V> {
    /// Accrues interest and runs one bounded margin call pass.
    /// Fails without side effects when a margin call cannot be settled.
    pub fn reinit(&mut self) -> Result<ReinitReport, PoolError> {
        self.ensure_regular()?;
        self.atomically(|pool| pool.reinit_inner())
    }

    pub(super) fn reinit_inner(&mut self) -> Result<ReinitReport, PoolError> {
        let mut report = ReinitReport {
            elapsed_secs: self.accrue()?,
            ..ReinitReport::default()
        };
        self.margin_call_scan(&mut report)?;
        Ok(report)
    }

    // implicit reinit in front of every trading call. true if the caller got margin called.
    pub(super) fn reinit_for(&mut self, account: AccountId) -> Result<bool, PoolError> {
        let report = self.reinit_inner()?;
        Ok(report.margin_called(account))
    }

    /// Moves the coefficients to the current time. a second call in the same second is a no-op.
    pub(super) fn accrue(&mut self) -> Result<u64, PoolError> {
        let elapsed = self.current_time.elapsed_since(self.last_reinit);
        if elapsed == 0 {
            return Ok(0);
        }

        let curve = self.pool_config.params.interest_rate_curve.clone();
        let fee = self.pool_config.params.fee;
        let base_fee = self.accrue_side(Asset::Base, elapsed, &curve, fee)?;
        let quote_fee = self.accrue_side(Asset::Quote, elapsed, &curve, fee)?;
        self.last_reinit = self.current_time;

        if self.config.record_accruals {
            self.emit_event(EventPayload::Reinit(ReinitEvent {
                elapsed_secs: elapsed,
                coefficients: self.coeffs,
                base_fee,
                quote_fee,
            }));
        }
        Ok(elapsed)
    }

    // 8.2.1: one asset's borrowers pay its lenders. the fee part goes to that asset's insurance fund.
    fn accrue_side(&mut self, asset: Asset, elapsed: u64, curve: &RateCurve, fee: Decimal) -> Result<u128, PoolError> {
        let discounted_collateral = self.totals.collateral(asset);
        let real_collateral = self.coeffs.real_collateral(asset, discounted_collateral)?;
        let real_debt = self.coeffs.real_debt(asset, self.totals.debt(asset))?;
        let accrual = compute_side_accrual(elapsed, real_collateral, real_debt, curve, fee)?;

        let debt_coeff = self.coeffs.debt(asset).mul(accrual.debt_factor)?;
        *self.coeffs.debt_mut(asset) = debt_coeff;

        let mut to_insurance = accrual.fee;
        if discounted_collateral == 0 {
            // nobody to pay, the protocol keeps it
            to_insurance = to_insurance.saturating_add(accrual.interest);
        } else {
            let collateral_coeff = self.coeffs.collateral(asset).mul(accrual.collateral_factor)?;
            *self.coeffs.collateral_mut(asset) = collateral_coeff;
        }
        self.insurance.get_mut(asset).deposit(to_insurance);
        Ok(to_insurance)
    }
}
