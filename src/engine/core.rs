// 8.0 engine/core.rs: the pool. owns the venue, wallets, ledger, queues, insurance and coefficients.
// 8.1 has the ledger mutation helpers every operation goes through.

use super::config::EngineConfig;
use super::results::{PoolError, PoolSnapshot};
use crate::amm::SwapVenue;
use crate::config::{ConfigError, PoolConfig, PoolParams};
use crate::events::{Event, EventId, EventPayload};
use crate::fp96::{Fp96, MathError};
use crate::insurance::InsuranceFunds;
use crate::ledger::PositionLedger;
use crate::margin_queue::MarginQueue;
use crate::oracle::PriceOracle;
use crate::position::{Coefficients, DiscountedTotals, Position, RealPosition};
use crate::risk::{self, Leverage};
use crate::tokens::{TokenError, Wallets};
use crate::types::{AccountId, Asset, PoolMode, PositionType, SwapDirection, Timestamp};
use log::debug;
use rust_decimal::Decimal;

/** 8.0: main pool struct. all state lives here, cloning it is a full checkpoint */
#[derive(Debug, Clone)]
pub struct MarginPool<V> {
    pub(super) config: EngineConfig,
    pub(super) pool_config: PoolConfig,
    pub(super) venue: V,
    pub(super) wallets: Wallets,
    pub(super) ledger: PositionLedger,
    pub(super) long_queue: MarginQueue,
    pub(super) short_queue: MarginQueue,
    pub(super) coeffs: Coefficients,
    pub(super) totals: DiscountedTotals,
    // real tokens held by the pool, insurance included
    pub(super) base_holdings: u128,
    pub(super) quote_holdings: u128,
    pub(super) insurance: InsuranceFunds,
    pub(super) mode: PoolMode,
    pub(super) emergency_withdraw_coeff: Fp96,
    pub(super) last_reinit: Timestamp,
    pub(super) current_time: Timestamp,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl<V: PriceOracle + SwapVenue + Clone> MarginPool<V> {
    pub fn new(pool_config: PoolConfig, config: EngineConfig, venue: V) -> Result<Self, ConfigError> {
        pool_config.validate()?;
        let start = pool_config.start_time;
        Ok(Self {
            config,
            pool_config,
            venue,
            wallets: Wallets::new(),
            ledger: PositionLedger::new(),
            long_queue: MarginQueue::new(),
            short_queue: MarginQueue::new(),
            coeffs: Coefficients::default(),
            totals: DiscountedTotals::default(),
            base_holdings: 0,
            quote_holdings: 0,
            insurance: InsuranceFunds::default(),
            mode: PoolMode::Regular,
            emergency_withdraw_coeff: Fp96::zero(),
            last_reinit: start,
            current_time: start,
            events: Vec::new(),
            next_event_id: 1,
        })
    }

    // time only moves forward
    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = self.current_time.max(timestamp);
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = self.current_time.plus_secs(secs);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn last_reinit(&self) -> Timestamp {
        self.last_reinit
    }

    pub fn params(&self) -> &PoolParams {
        &self.pool_config.params
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    pub fn coefficients(&self) -> Coefficients {
        self.coeffs
    }

    pub fn totals(&self) -> DiscountedTotals {
        self.totals
    }

    pub fn emergency_withdraw_coeff(&self) -> Fp96 {
        self.emergency_withdraw_coeff
    }

    pub fn insurance(&self) -> &InsuranceFunds {
        &self.insurance
    }

    pub fn holdings(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Quote => self.quote_holdings,
            _ => self.base_holdings,
        }
    }

    /// Holdings minus the insurance earmark. what users can actually take out.
    pub fn available(&self, asset: Asset) -> u128 {
        self.holdings(asset)
            .saturating_sub(self.insurance.get(asset).balance)
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn venue_mut(&mut self) -> &mut V {
        &mut self.venue
    }

    pub fn wallets(&self) -> &Wallets {
        &self.wallets
    }

    pub fn wallets_mut(&mut self) -> &mut Wallets {
        &mut self.wallets
    }

    pub fn balance_of(&self, account: AccountId, asset: Asset) -> u128 {
        self.wallets.balance(account, asset)
    }

    pub fn mint(&mut self, account: AccountId, asset: Asset, amount: u128) -> Result<(), TokenError> {
        self.wallets.mint(account, asset, amount)
    }

    pub fn position(&self, account: AccountId) -> Position {
        self.ledger.get(account)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.ledger.iter()
    }

    pub fn real_position(&self, account: AccountId) -> Result<RealPosition, PoolError> {
        Ok(self.coeffs.real_position(&self.ledger.get(account))?)
    }

    /// Real amounts as they will be once interest up to now is accrued.
    pub fn preview_real_position(&self, account: AccountId) -> Result<RealPosition, PoolError> {
        let mut scratch = self.checkpoint();
        scratch.accrue()?;
        scratch.real_position(account)
    }

    pub fn spot_price(&self) -> Result<Fp96, PoolError> {
        Ok(self.venue.spot_price()?)
    }

    pub fn twap_price(&self) -> Result<Fp96, PoolError> {
        Ok(self
            .venue
            .twap_price(self.current_time, self.pool_config.params.twap_window_secs)?)
    }

    pub fn leverage(&self, account: AccountId) -> Result<Leverage, PoolError> {
        let price = self.oracle_price()?;
        self.leverage_at(&self.ledger.get(account), price)
    }

    pub fn system_leverage(&self, side: PositionType) -> Result<Leverage, PoolError> {
        let price = self.oracle_price()?;
        Ok(risk::system_leverage(side, &self.totals, &self.coeffs, price)?)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            mode: self.mode,
            time: self.current_time,
            last_reinit: self.last_reinit,
            coefficients: self.coeffs,
            totals: self.totals,
            base_holdings: self.base_holdings,
            quote_holdings: self.quote_holdings,
            insurance: self.insurance,
            emergency_withdraw_coeff: self.emergency_withdraw_coeff,
            positions: self.ledger.len(),
        }
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Tops up an insurance fund from an account's wallet.
    pub fn fund_insurance(&mut self, from: AccountId, asset: Asset, amount: u128) -> Result<(), PoolError> {
        self.atomically(|pool| {
            pool.wallets.debit(from, asset, amount)?;
            pool.add_holdings(asset, amount)?;
            pool.insurance.get_mut(asset).deposit(amount);
            Ok(())
        })
    }

    // Runs `op` with all-or-nothing semantics. any error restores the state from before the call.
    pub(super) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let checkpoint = self.checkpoint();
        let result = op(self);
        if result.is_err() {
            self.restore(checkpoint);
        } else {
            self.trim_events();
        }
        result
    }

    /// Copy of everything but the event log. the log is append only between
    /// checkpoints, so `restore` cuts it back by event id instead.
    pub(crate) fn checkpoint(&self) -> Self {
        Self {
            config: self.config.clone(),
            pool_config: self.pool_config.clone(),
            venue: self.venue.clone(),
            wallets: self.wallets.clone(),
            ledger: self.ledger.clone(),
            long_queue: self.long_queue.clone(),
            short_queue: self.short_queue.clone(),
            coeffs: self.coeffs,
            totals: self.totals,
            base_holdings: self.base_holdings,
            quote_holdings: self.quote_holdings,
            insurance: self.insurance,
            mode: self.mode,
            emergency_withdraw_coeff: self.emergency_withdraw_coeff,
            last_reinit: self.last_reinit,
            current_time: self.current_time,
            events: Vec::new(),
            next_event_id: self.next_event_id,
        }
    }

    /// Puts a checkpoint back and drops the events recorded since it was taken.
    pub(crate) fn restore(&mut self, checkpoint: Self) {
        let mut events = std::mem::take(&mut self.events);
        events.retain(|event| event.id.0 < checkpoint.next_event_id);
        *self = checkpoint;
        self.events = events;
    }

    pub(super) fn ensure_regular(&self) -> Result<(), PoolError> {
        if self.mode.is_emergency() {
            return Err(PoolError::EmergencyMode);
        }
        Ok(())
    }

    pub(super) fn oracle_price(&self) -> Result<Fp96, PoolError> {
        self.twap_price()
    }

    pub(super) fn leverage_at(&self, position: &Position, price: Fp96) -> Result<Leverage, PoolError> {
        let real = self.coeffs.real_position(position)?;
        Ok(risk::position_leverage(&real, price)?)
    }

    pub(super) fn fraction(value: Decimal) -> Result<Fp96, PoolError> {
        Ok(Fp96::from_decimal(value)?)
    }

    /// Venue output expected at the oracle price, before slippage.
    pub(super) fn expected_output(direction: SwapDirection, amount_in: u128, price: Fp96) -> Result<u128, MathError> {
        match direction {
            SwapDirection::BaseToQuote => price.mul_amount(amount_in),
            SwapDirection::QuoteToBase => price.div_amount(amount_in),
        }
    }

    /// Minimum acceptable output for a forced swap, per `mc_slippage`.
    pub(super) fn forced_swap_min_out(&self, direction: SwapDirection, amount_in: u128, price: Fp96) -> Result<u128, PoolError> {
        let expected = Self::expected_output(direction, amount_in, price)?;
        let keep = Self::fraction(Decimal::ONE - self.pool_config.params.mc_slippage)?;
        Ok(keep.mul_amount(expected)?)
    }

    // 8.1: ledger mutation helpers. each keeps the aggregate totals in step with the position.

    pub(super) fn holdings_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::Quote => &mut self.quote_holdings,
            _ => &mut self.base_holdings,
        }
    }

    pub(super) fn add_holdings(&mut self, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let slot = self.holdings_mut(asset);
        *slot = slot.checked_add(amount).ok_or(MathError::Overflow)?;
        Ok(())
    }

    pub(super) fn remove_holdings(&mut self, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let slot = self.holdings_mut(asset);
        *slot = slot
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientLiquidity { asset })?;
        Ok(())
    }

    pub(super) fn add_collateral(&mut self, position: &mut Position, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let discounted = self.coeffs.discount_collateral(asset, amount)?;
        let slot = position.discounted_mut(asset);
        *slot = slot.checked_add(discounted).ok_or(MathError::Overflow)?;
        let total = self.totals.collateral_mut(asset);
        *total = total.checked_add(discounted).ok_or(MathError::Overflow)?;
        Ok(())
    }

    /// Removes `amount` of real collateral, all of it if `amount` reaches the balance.
    pub(super) fn remove_collateral(&mut self, position: &mut Position, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let held = position.discounted(asset);
        let real = self.coeffs.real_collateral(asset, held)?;
        let discounted = if amount >= real {
            held
        } else {
            self.coeffs.discount_collateral_up(asset, amount)?.min(held)
        };
        *position.discounted_mut(asset) -= discounted;
        let total = self.totals.collateral_mut(asset);
        *total = total.saturating_sub(discounted);
        Ok(())
    }

    pub(super) fn add_debt(&mut self, position: &mut Position, asset: Asset, amount: u128) -> Result<(), PoolError> {
        let discounted = self.coeffs.discount_debt(asset, amount)?;
        let slot = position.discounted_mut(asset);
        *slot = slot.checked_add(discounted).ok_or(MathError::Overflow)?;
        let total = self.totals.debt_mut(asset);
        *total = total.checked_add(discounted).ok_or(MathError::Overflow)?;
        Ok(())
    }

    /// Repays up to `amount` of debt and returns the real amount repaid.
    pub(super) fn repay_debt(&mut self, position: &mut Position, asset: Asset, amount: u128) -> Result<u128, PoolError> {
        let owed = position.discounted(asset);
        let real = self.coeffs.real_debt(asset, owed)?;
        let repaid = amount.min(real);
        let discounted = if repaid == real {
            owed
        } else {
            self.coeffs.discount_repayment(asset, repaid)?.min(owed)
        };
        *position.discounted_mut(asset) -= discounted;
        let total = self.totals.debt_mut(asset);
        *total = total.saturating_sub(discounted);
        Ok(repaid)
    }

    /// Drops every claim of the position from the aggregate totals.
    pub(super) fn release_claims(&mut self, position: &Position) {
        for asset in [Asset::Base, Asset::Quote] {
            let discounted = position.discounted(asset);
            if position.holds_collateral_in(asset) {
                let total = self.totals.collateral_mut(asset);
                *total = total.saturating_sub(discounted);
            } else if position.kind.is_leveraged() {
                let total = self.totals.debt_mut(asset);
                *total = total.saturating_sub(discounted);
            }
        }
    }

    /// Applies a deposit of `asset`, repaying debt first. returns the amount that went to debt.
    pub(super) fn apply_deposit(&mut self, position: &mut Position, asset: Asset, amount: u128) -> Result<u128, PoolError> {
        if amount == 0 {
            return Ok(0);
        }
        if !position.is_initialized() {
            position.kind = PositionType::Lend;
        }
        let mut repaid = 0;
        if position.debt_asset() == Some(asset) {
            repaid = self.repay_debt(position, asset, amount)?;
            if position.discounted(asset) == 0 {
                position.kind = PositionType::Lend;
            }
        }
        let rest = amount - repaid;
        if rest > 0 {
            self.add_collateral(position, asset, rest)?;
        }
        Ok(repaid)
    }

    pub(super) fn check_limit(&self, asset: Asset) -> Result<(), PoolError> {
        let limit = self.pool_config.params.limit_for(asset);
        let total = self
            .coeffs
            .real_collateral(asset, self.totals.collateral(asset))?;
        if total > limit {
            return Err(PoolError::ExceedsLimit { asset, limit });
        }
        Ok(())
    }

    /// Writes the position back and keeps the margin queues in step. an empty Lend is cleared.
    pub(super) fn store(&mut self, account: AccountId, position: Position) {
        match position.kind {
            PositionType::Long => {
                self.short_queue.remove(account);
                self.long_queue.upsert(account, &position);
            }
            PositionType::Short => {
                self.long_queue.remove(account);
                self.short_queue.upsert(account, &position);
            }
            _ => {
                self.long_queue.remove(account);
                self.short_queue.remove(account);
            }
        }
        if position.kind == PositionType::Lend && position.is_empty() {
            self.ledger.clear(account);
        } else {
            self.ledger.set(account, position);
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            debug!("[event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);
    }

    // retention cap, applied once an operation commits
    fn trim_events(&mut self) {
        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
