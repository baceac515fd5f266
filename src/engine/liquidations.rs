// 8.3: margin calls and position transfer to liquidators.
// a margin call sells all collateral for the debt asset. surplus goes to that asset's
// lenders, a shortfall is paid by insurance. if insurance cannot pay, the call fails.
// collateral the pool has lent to the other side waits in `deferred` until it comes back,
// unless the position already owes more than its collateral and insurance can pay.

use super::core::MarginPool;
use super::results::{MarginCallResult, PoolError, ReinitReport};
use crate::amm::SwapVenue;
use crate::events::{BadDebtEvent, EventPayload, MarginCallEvent, ReceivePositionEvent};
use crate::fp96::Fp96;
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::risk::{self, Leverage};
use crate::types::{AccountId, Asset, SwapDirection};
use log::{debug, info, warn};

impl<V: PriceOracle + SwapVenue + Clone> MarginPool<V> {
    // 8.3.1: riskiest first on each side, at most max_margin_calls_per_reinit per pass.
    pub(super) fn margin_call_scan(&mut self, report: &mut ReinitReport) -> Result<(), PoolError> {
        if self.long_queue.is_empty() && self.short_queue.is_empty() {
            return Ok(());
        }
        let budget = self.pool_config.params.max_margin_calls_per_reinit;
        let threshold = self.pool_config.params.margin_call_leverage_fp()?;

        let result = self.work_queues(report, budget, threshold);
        // deferred positions go back in line for the next pass
        for &account in &report.deferred {
            let position = self.ledger.get(account);
            self.store(account, position);
        }
        result
    }

    fn work_queues(&mut self, report: &mut ReinitReport, budget: usize, threshold: Fp96) -> Result<(), PoolError> {
        loop {
            let price = self.oracle_price()?;
            let Some(account) = self.riskiest_callable(price, threshold)? else {
                return Ok(());
            };
            if report.margin_calls.len() >= budget {
                report.pending = true;
                return Ok(());
            }
            match self.margin_call(account, price)? {
                Some(call) => report.margin_calls.push(call),
                None => {
                    self.long_queue.remove(account);
                    self.short_queue.remove(account);
                    report.deferred.push(account);
                }
            }
        }
    }

    fn riskiest_callable(&self, price: Fp96, threshold: Fp96) -> Result<Option<AccountId>, PoolError> {
        let mut worst: Option<(Fp96, AccountId)> = None;
        for candidate in [self.long_queue.peek(), self.short_queue.peek()].into_iter().flatten() {
            let leverage = self.leverage_at(&self.ledger.get(candidate), price)?;
            if !risk::is_margin_callable(leverage, threshold) {
                continue;
            }
            let severity = match leverage {
                Leverage::Finite(value) => value,
                _ => Fp96::max_value(),
            };
            if worst.map_or(true, |(current, _)| severity > current) {
                worst = Some((severity, candidate));
            }
        }
        Ok(worst.map(|(_, account)| account))
    }

    /// Sells the position's collateral and settles its debt. `None` when the collateral
    /// is out on loan and the call has to wait.
    pub(super) fn margin_call(&mut self, account: AccountId, price: Fp96) -> Result<Option<MarginCallResult>, PoolError> {
        let position = self.ledger.get(account);
        let Some(collateral_asset) = position.collateral_asset() else {
            return Err(PoolError::InvalidPosition { account, kind: position.kind });
        };
        let debt_asset = collateral_asset.other();
        let real = self.coeffs.real_position(&position)?;
        let collateral = real.collateral(collateral_asset);
        let debt = real.debt(debt_asset);
        let direction = match collateral_asset {
            Asset::Quote => SwapDirection::QuoteToBase,
            _ => SwapDirection::BaseToQuote,
        };

        if self.holdings(collateral_asset) < collateral {
            self.check_deferrable(account, direction, collateral, debt, price)?;
            debug!(
                "margin call {} deferred: {} {} collateral, pool holds {}",
                account,
                collateral,
                collateral_asset,
                self.holdings(collateral_asset)
            );
            return Ok(None);
        }
        let received = if collateral == 0 {
            0
        } else {
            let min_out = self.forced_swap_min_out(direction, collateral, price)?;
            self.venue
                .swap_exact_input(self.current_time, direction, collateral, min_out)?
        };
        self.remove_holdings(collateral_asset, collateral)?;
        self.add_holdings(debt_asset, received)?;
        self.release_claims(&position);

        let surplus = received.saturating_sub(debt);
        let bad_debt = debt.saturating_sub(received);
        if surplus > 0 {
            self.distribute_surplus(debt_asset, surplus)?;
        }
        if bad_debt > 0 {
            self.cover_bad_debt(account, debt_asset, bad_debt)?;
        }
        self.store(account, Position::default());

        info!(
            "margin call {}: sold {} {} for {} {}, debt {}, surplus {}, bad debt {}",
            account, collateral, collateral_asset, received, debt_asset, debt, surplus, bad_debt
        );
        self.emit_event(EventPayload::MarginCall(MarginCallEvent {
            account,
            collateral_asset,
            collateral_sold: collateral,
            debt_repaid: debt,
            surplus,
            bad_debt,
        }));

        Ok(Some(MarginCallResult {
            account,
            kind: position.kind,
            collateral_sold: collateral,
            debt_repaid: debt,
            surplus,
            bad_debt,
        }))
    }

    // 8.3.2: a deferred call must still be payable. valued at the oracle price, whatever the
    // collateral cannot cover has to fit in the debt asset's insurance fund.
    fn check_deferrable(
        &self,
        account: AccountId,
        direction: SwapDirection,
        collateral: u128,
        debt: u128,
        price: Fp96,
    ) -> Result<(), PoolError> {
        let debt_asset = direction.output();
        let worth = Self::expected_output(direction, collateral, price)?;
        let shortfall = debt.saturating_sub(worth);
        if shortfall > 0 && !self.insurance.get(debt_asset).can_cover(shortfall) {
            warn!(
                "{} is short {} {} and its collateral is on loan, insurance holds {}",
                account,
                shortfall,
                debt_asset,
                self.insurance.get(debt_asset).balance
            );
            return Err(PoolError::InsufficientLiquidity { asset: debt_asset });
        }
        Ok(())
    }

    // raises the collateral coefficient so every lender of `asset` shares it pro rata
    fn distribute_surplus(&mut self, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let discounted = self.totals.collateral(asset);
        if discounted == 0 {
            self.insurance.get_mut(asset).deposit(amount);
            return Ok(());
        }
        let step = Fp96::from_ratio(amount, discounted)?;
        let coeff = self.coeffs.collateral(asset).add(step)?;
        *self.coeffs.collateral_mut(asset) = coeff;
        Ok(())
    }

    fn cover_bad_debt(&mut self, account: AccountId, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let fund = self.insurance.get_mut(asset);
        if !fund.can_cover(amount) {
            warn!(
                "bad debt of {} {} from {} exceeds insurance {}",
                amount, asset, account, fund.balance
            );
            return Err(PoolError::InsufficientLiquidity { asset });
        }
        fund.cover_bad_debt(amount);
        let insurance_balance = fund.balance;
        warn!("insurance covered {} {} of bad debt from {}", amount, asset, account);
        self.emit_event(EventPayload::BadDebtCovered(BadDebtEvent {
            account,
            asset,
            amount,
            insurance_balance,
        }));
        Ok(())
    }

    /// Hands a margin-callable position to `liquidator`, who repays debt or adds collateral
    /// with `quote_amount` and `base_amount`. The result must sit within max leverage.
    pub fn receive_position(
        &mut self,
        liquidator: AccountId,
        target: AccountId,
        quote_amount: u128,
        base_amount: u128,
    ) -> Result<Position, PoolError> {
        self.ensure_regular()?;
        if liquidator == target {
            return Err(PoolError::SelfLiquidation);
        }

        self.atomically(|pool| {
            if pool.ledger.get(liquidator).is_initialized() {
                return Err(PoolError::PositionInitialized { account: liquidator });
            }
            pool.accrue()?;

            let mut position = pool.ledger.get(target);
            if !position.kind.is_leveraged() {
                return Err(PoolError::NotLiquidatable { account: target });
            }
            let price = pool.oracle_price()?;
            let threshold = pool.pool_config.params.margin_call_leverage_fp()?;
            if !risk::is_margin_callable(pool.leverage_at(&position, price)?, threshold) {
                return Err(PoolError::NotLiquidatable { account: target });
            }

            for (asset, amount) in [(Asset::Quote, quote_amount), (Asset::Base, base_amount)] {
                if amount == 0 {
                    continue;
                }
                pool.wallets.debit(liquidator, asset, amount)?;
                pool.add_holdings(asset, amount)?;
                pool.apply_deposit(&mut position, asset, amount)?;
            }

            let max = pool.pool_config.params.max_leverage_fp()?;
            risk::ensure_within(pool.leverage_at(&position, price)?, max)?;

            pool.store(target, Position::default());
            pool.store(liquidator, position);

            info!("{} received position of {}", liquidator, target);
            pool.emit_event(EventPayload::ReceivePosition(ReceivePositionEvent {
                liquidator,
                target,
                base_amount,
                quote_amount,
                position,
            }));
            Ok(position)
        })
    }
}

