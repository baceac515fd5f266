// 8.5 engine/emergency.rs: one way shutdown into pro rata withdrawal.
//
// shutdown is only allowed when reinit fails because a side cannot be settled.
// the asset that failed names the mode: base shortfall -> ShortEmergency, quote -> LongEmergency.
// the holders of that asset's collateral are paid out of everything the pool still has,
// converted into that asset.

use super::core::MarginPool;
use super::results::PoolError;
use crate::amm::SwapVenue;
use crate::events::{EmergencyShutdownEvent, EmergencyWithdrawEvent, EventPayload};
use crate::fp96::Fp96;
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::tokens::payout_asset;
use crate::types::{AccountId, Asset, PoolMode, PositionType, SwapDirection};
use log::info;

impl<V: PriceOracle + SwapVenue + Clone> MarginPool<V> {
    pub fn shut_down(&mut self) -> Result<PoolMode, PoolError> {
        if self.mode.is_emergency() {
            return Err(PoolError::AlreadyInEmergency);
        }

        let mut scratch = self.checkpoint();
        let mode = match scratch.reinit_inner() {
            Ok(_) => return Err(PoolError::NotEligibleForShutdown),
            Err(PoolError::InsufficientLiquidity { asset: Asset::Base }) => PoolMode::ShortEmergency,
            Err(PoolError::InsufficientLiquidity { asset: Asset::Quote }) => PoolMode::LongEmergency,
            Err(other) => return Err(other),
        };

        self.atomically(|pool| pool.enter_emergency(mode))?;
        Ok(mode)
    }

    fn enter_emergency(&mut self, mode: PoolMode) -> Result<(), PoolError> {
        self.accrue()?;
        let surviving = Self::surviving_asset(mode)?;
        let other = surviving.other();

        // insurance is pooled with everything else
        self.insurance.base.drain();
        self.insurance.quote.drain();

        let sell = self.holdings(other);
        let swapped_in = if sell == 0 {
            0
        } else {
            let direction = match other {
                Asset::Quote => SwapDirection::QuoteToBase,
                _ => SwapDirection::BaseToQuote,
            };
            let price = self.oracle_price()?;
            let min_out = self.forced_swap_min_out(direction, sell, price)?;
            let now = self.current_time;
            self.venue.swap_exact_input(now, direction, sell, min_out)?
        };
        self.remove_holdings(other, sell)?;
        self.add_holdings(surviving, swapped_in)?;

        let available = self.holdings(surviving);
        let discounted = self.totals.collateral(surviving);
        let coeff = if discounted == 0 {
            Fp96::zero()
        } else {
            Fp96::from_ratio(available, discounted)?
        };

        self.mode = mode;
        self.emergency_withdraw_coeff = coeff;

        info!(
            "pool entered {:?}: {} {} available, withdraw coefficient {}",
            mode, available, surviving, coeff
        );
        self.emit_event(EventPayload::EmergencyShutdown(EmergencyShutdownEvent {
            mode,
            surviving_asset: surviving,
            swapped_in,
            available,
            emergency_withdraw_coeff: coeff,
        }));
        Ok(())
    }

    /// Pays `emergency_withdraw_coeff * discounted` of the surviving asset and clears the position.
    /// A position that was already paid out gets zero.
    pub fn emergency_withdraw(&mut self, account: AccountId, unwrap_native: bool) -> Result<u128, PoolError> {
        let surviving = Self::surviving_asset(self.mode)?;

        self.atomically(|pool| {
            let position = pool.ledger.get(account);
            match (pool.mode, position.kind) {
                (_, PositionType::Uninitialized) => return Ok(0),
                (PoolMode::ShortEmergency, PositionType::Short) => return Err(PoolError::ShortEmergency),
                (PoolMode::LongEmergency, PositionType::Long) => return Err(PoolError::LongEmergency),
                _ => {}
            }

            let discounted = position.discounted(surviving);
            let amount = pool
                .emergency_withdraw_coeff
                .mul_amount(discounted)?
                .min(pool.holdings(surviving));
            pool.remove_holdings(surviving, amount)?;
            pool.release_claims(&position);
            pool.store(account, Position::default());

            let paid_as = payout_asset(surviving, pool.pool_config.tokens.wrapped_native, unwrap_native);
            pool.wallets.credit(account, paid_as, amount)?;

            pool.emit_event(EventPayload::EmergencyWithdraw(EmergencyWithdrawEvent {
                account,
                asset: surviving,
                paid_as,
                amount,
            }));
            Ok(amount)
        })
    }

    fn surviving_asset(mode: PoolMode) -> Result<Asset, PoolError> {
        match mode {
            PoolMode::ShortEmergency => Ok(Asset::Base),
            PoolMode::LongEmergency => Ok(Asset::Quote),
            PoolMode::Regular => Err(PoolError::NotInEmergency),
        }
    }
}
