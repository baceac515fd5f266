// 8.4 engine/trading.rs: deposit, withdraw, long, short, close.
// each call: implicit reinit, then checks, then ledger mutation, then an event.
// everything runs inside `atomically`, so a failed check leaves no trace.

use super::core::MarginPool;
use super::results::{CloseResult, Outcome, PoolError, TradeResult};
use crate::amm::SwapVenue;
use crate::events::{ClosePositionEvent, DepositEvent, EventPayload, TradeEvent, WithdrawEvent};
use crate::fp96::{Fp96, MathError};
use crate::oracle::PriceOracle;
use crate::risk;
use crate::tokens::payout_asset;
use crate::types::{AccountId, Asset, PositionType, SwapDirection};
use log::debug;
use rust_decimal::Decimal;

impl<V: PriceOracle + SwapVenue + Clone> MarginPool<V> {
    pub fn deposit_base(&mut self, account: AccountId, amount: u128) -> Result<Outcome<u128>, PoolError> {
        self.deposit(account, Asset::Base, amount)
    }

    pub fn deposit_quote(&mut self, account: AccountId, amount: u128) -> Result<Outcome<u128>, PoolError> {
        self.deposit(account, Asset::Quote, amount)
    }

    pub fn withdraw_base(
        &mut self,
        account: AccountId,
        amount: u128,
        unwrap_native: bool,
    ) -> Result<Outcome<u128>, PoolError> {
        self.withdraw(account, Asset::Base, amount, unwrap_native)
    }

    pub fn withdraw_quote(
        &mut self,
        account: AccountId,
        amount: u128,
        unwrap_native: bool,
    ) -> Result<Outcome<u128>, PoolError> {
        self.withdraw(account, Asset::Quote, amount, unwrap_native)
    }

    // 8.4.1: deposits repay debt in the same asset first, the rest is collateral.
    pub fn deposit(&mut self, account: AccountId, asset: Asset, amount: u128) -> Result<Outcome<u128>, PoolError> {
        self.ensure_regular()?;
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        self.atomically(|pool| {
            if pool.reinit_for(account)? {
                return Ok(Outcome::MarginCalled);
            }

            let mut position = pool.ledger.get(account);
            if !position.is_initialized() {
                let minimum = pool.pool_config.params.position_min_amount;
                if amount < minimum {
                    return Err(PoolError::LessThanMinimum { amount, minimum });
                }
            }

            pool.wallets.debit(account, asset, amount)?;
            pool.add_holdings(asset, amount)?;
            let repaid = pool.apply_deposit(&mut position, asset, amount)?;
            if repaid < amount {
                pool.check_limit(asset)?;
            }
            pool.store(account, position);

            pool.emit_event(EventPayload::Deposit(DepositEvent {
                account,
                asset,
                amount,
                repaid,
                position,
            }));
            Ok(Outcome::Executed(amount))
        })
    }

    // 8.4.2: capped at real collateral. the asset a position owes cannot be withdrawn.
    pub fn withdraw(
        &mut self,
        account: AccountId,
        asset: Asset,
        amount: u128,
        unwrap_native: bool,
    ) -> Result<Outcome<u128>, PoolError> {
        self.ensure_regular()?;
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        self.atomically(|pool| {
            if pool.reinit_for(account)? {
                return Ok(Outcome::MarginCalled);
            }

            let mut position = pool.ledger.get(account);
            if !position.is_initialized() {
                return Err(PoolError::UninitializedPosition { account });
            }
            if position.debt_asset() == Some(asset) {
                return Err(PoolError::DebtAssetWithdrawal { asset });
            }

            let held = pool.coeffs.real_collateral(asset, position.discounted(asset))?;
            let amount = amount.min(held);
            if amount == 0 {
                return Ok(Outcome::Executed(0));
            }
            pool.remove_collateral(&mut position, asset, amount)?;

            if position.kind.is_leveraged() {
                let price = pool.oracle_price()?;
                let max = pool.pool_config.params.max_leverage_fp()?;
                risk::ensure_within(pool.leverage_at(&position, price)?, max)?;
            }
            if pool.available(asset) < amount {
                return Err(PoolError::InsufficientLiquidity { asset });
            }

            pool.remove_holdings(asset, amount)?;
            let paid_as = payout_asset(asset, pool.pool_config.tokens.wrapped_native, unwrap_native);
            pool.wallets.credit(account, paid_as, amount)?;
            pool.store(account, position);

            pool.emit_event(EventPayload::Withdraw(WithdrawEvent {
                account,
                asset,
                paid_as,
                amount,
                position,
            }));
            Ok(Outcome::Executed(amount))
        })
    }

    // 8.4.3: borrow quote, buy exactly `base_amount` of base. swap fee is added to the debt.
    pub fn long(&mut self, account: AccountId, base_amount: u128, limit_price: Fp96) -> Result<Outcome<TradeResult>, PoolError> {
        self.ensure_regular()?;
        self.check_trade_amount(base_amount)?;

        self.atomically(|pool| {
            if pool.reinit_for(account)? {
                return Ok(Outcome::MarginCalled);
            }

            let mut position = pool.ledger.get(account);
            match position.kind {
                PositionType::Long => {}
                PositionType::Lend if position.discounted_quote == 0 => {}
                kind => return Err(PoolError::InvalidPosition { account, kind }),
            }

            let oracle = pool.oracle_price()?;
            let quote_in = pool.venue.quote_exact_output(SwapDirection::QuoteToBase, base_amount)?;
            let execution_price = Fp96::from_ratio(quote_in, base_amount)?;
            if execution_price > limit_price {
                return Err(PoolError::LimitPriceViolated { price: execution_price, limit: limit_price });
            }
            let ceiling = oracle.mul(pool.slippage_band(true)?)?;
            if execution_price > ceiling {
                return Err(PoolError::SlippageExceeded { price: execution_price, oracle });
            }
            if pool.available(Asset::Quote) < quote_in {
                return Err(PoolError::InsufficientLiquidity { asset: Asset::Quote });
            }

            let now = pool.current_time;
            let paid = pool
                .venue
                .swap_exact_output(now, SwapDirection::QuoteToBase, quote_in, base_amount)?;
            pool.remove_holdings(Asset::Quote, paid)?;
            pool.add_holdings(Asset::Base, base_amount)?;

            let fee = pool.swap_fee_on(paid)?;
            position.kind = PositionType::Long;
            pool.add_collateral(&mut position, Asset::Base, base_amount)?;
            pool.add_debt(&mut position, Asset::Quote, paid.checked_add(fee).ok_or(MathError::Overflow)?)?;
            pool.insurance.get_mut(Asset::Quote).deposit(fee);
            pool.check_limit(Asset::Base)?;

            let leverage = pool.leverage_at(&position, oracle)?;
            risk::ensure_within(leverage, pool.pool_config.params.max_leverage_fp()?)?;
            pool.store(account, position);

            debug!("{} long {} base for {} quote, leverage {}", account, base_amount, paid, leverage);
            pool.emit_event(EventPayload::Long(TradeEvent {
                account,
                base_amount,
                quote_amount: paid,
                fee,
                price: execution_price,
                position,
            }));
            Ok(Outcome::Executed(TradeResult {
                account,
                kind: PositionType::Long,
                base_amount,
                quote_amount: paid,
                fee,
                execution_price,
                leverage,
            }))
        })
    }

    // 8.4.4: borrow `base_amount` of base and sell it. swap fee comes out of the proceeds.
    pub fn short(&mut self, account: AccountId, base_amount: u128, limit_price: Fp96) -> Result<Outcome<TradeResult>, PoolError> {
        self.ensure_regular()?;
        self.check_trade_amount(base_amount)?;

        self.atomically(|pool| {
            if pool.reinit_for(account)? {
                return Ok(Outcome::MarginCalled);
            }

            let mut position = pool.ledger.get(account);
            match position.kind {
                PositionType::Short => {}
                PositionType::Lend if position.discounted_base == 0 => {}
                kind => return Err(PoolError::InvalidPosition { account, kind }),
            }
            if pool.available(Asset::Base) < base_amount {
                return Err(PoolError::InsufficientLiquidity { asset: Asset::Base });
            }

            let oracle = pool.oracle_price()?;
            let quote_out = pool.venue.quote_exact_input(SwapDirection::BaseToQuote, base_amount)?;
            let execution_price = Fp96::from_ratio(quote_out, base_amount)?;
            if execution_price < limit_price {
                return Err(PoolError::LimitPriceViolated { price: execution_price, limit: limit_price });
            }
            let floor = oracle.mul(pool.slippage_band(false)?)?;
            if execution_price < floor {
                return Err(PoolError::SlippageExceeded { price: execution_price, oracle });
            }

            let now = pool.current_time;
            let received = pool
                .venue
                .swap_exact_input(now, SwapDirection::BaseToQuote, base_amount, quote_out)?;
            pool.remove_holdings(Asset::Base, base_amount)?;
            pool.add_holdings(Asset::Quote, received)?;

            let fee = pool.swap_fee_on(received)?.min(received);
            position.kind = PositionType::Short;
            pool.add_collateral(&mut position, Asset::Quote, received - fee)?;
            pool.add_debt(&mut position, Asset::Base, base_amount)?;
            pool.insurance.get_mut(Asset::Quote).deposit(fee);
            pool.check_limit(Asset::Quote)?;

            let leverage = pool.leverage_at(&position, oracle)?;
            risk::ensure_within(leverage, pool.pool_config.params.max_leverage_fp()?)?;
            pool.store(account, position);

            debug!("{} short {} base for {} quote, leverage {}", account, base_amount, received, leverage);
            pool.emit_event(EventPayload::Short(TradeEvent {
                account,
                base_amount,
                quote_amount: received,
                fee,
                price: execution_price,
                position,
            }));
            Ok(Outcome::Executed(TradeResult {
                account,
                kind: PositionType::Short,
                base_amount,
                quote_amount: received,
                fee,
                execution_price,
                leverage,
            }))
        })
    }

    // 8.4.5: buy back the whole debt with collateral. what is left stays as a Lend position.
    pub fn close_position(&mut self, account: AccountId) -> Result<Outcome<CloseResult>, PoolError> {
        self.ensure_regular()?;

        self.atomically(|pool| {
            if pool.reinit_for(account)? {
                return Ok(Outcome::MarginCalled);
            }

            let mut position = pool.ledger.get(account);
            let Some(collateral_asset) = position.collateral_asset() else {
                return Err(PoolError::InvalidPosition { account, kind: position.kind });
            };
            let debt_asset = collateral_asset.other();
            let real = pool.coeffs.real_position(&position)?;
            let debt = real.debt(debt_asset);
            let collateral = real.collateral(collateral_asset);
            let direction = match collateral_asset {
                Asset::Quote => SwapDirection::QuoteToBase,
                _ => SwapDirection::BaseToQuote,
            };

            let oracle = pool.oracle_price()?;
            let cost = if debt == 0 {
                0
            } else {
                pool.venue.quote_exact_output(direction, debt)?
            };
            let fee = pool.swap_fee_on(cost)?;
            let spent = cost.checked_add(fee).ok_or(MathError::Overflow)?;
            if spent > collateral {
                return Err(PoolError::InsufficientCollateral { account });
            }
            if debt > 0 {
                // execution price in quote per base, checked against the oracle band
                let (execution_price, within) = match direction {
                    SwapDirection::BaseToQuote => {
                        let price = Fp96::from_ratio(debt, cost)?;
                        (price, price >= oracle.mul(pool.slippage_band(false)?)?)
                    }
                    SwapDirection::QuoteToBase => {
                        let price = Fp96::from_ratio(cost, debt)?;
                        (price, price <= oracle.mul(pool.slippage_band(true)?)?)
                    }
                };
                if !within {
                    return Err(PoolError::SlippageExceeded { price: execution_price, oracle });
                }
            }
            if pool.available(collateral_asset) < cost {
                return Err(PoolError::InsufficientLiquidity { asset: collateral_asset });
            }

            let paid = if debt == 0 {
                0
            } else {
                let now = pool.current_time;
                pool.venue.swap_exact_output(now, direction, cost, debt)?
            };
            pool.remove_holdings(collateral_asset, paid)?;
            pool.add_holdings(debt_asset, debt)?;

            pool.repay_debt(&mut position, debt_asset, debt)?;
            pool.remove_collateral(&mut position, collateral_asset, paid + fee)?;
            pool.insurance.get_mut(collateral_asset).deposit(fee);
            position.kind = PositionType::Lend;
            pool.store(account, position);
            let remaining = pool.ledger.get(account).kind;

            debug!("{} closed: sold {} {} to repay {} {}", account, paid, collateral_asset, debt, debt_asset);
            pool.emit_event(EventPayload::ClosePosition(ClosePositionEvent {
                account,
                collateral_sold: paid,
                debt_repaid: debt,
                fee,
                position: pool.ledger.get(account),
            }));
            Ok(Outcome::Executed(CloseResult {
                account,
                collateral_sold: paid,
                debt_repaid: debt,
                fee,
                remaining,
            }))
        })
    }

    fn check_trade_amount(&self, base_amount: u128) -> Result<(), PoolError> {
        if base_amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let minimum = self.pool_config.params.position_min_amount;
        if base_amount < minimum {
            return Err(PoolError::LessThanMinimum { amount: base_amount, minimum });
        }
        Ok(())
    }

    fn swap_fee_on(&self, amount: u128) -> Result<u128, PoolError> {
        Ok(Self::fraction(self.pool_config.params.swap_fee)?.mul_amount_up(amount)?)
    }

    // 1 +/- position_slippage
    fn slippage_band(&self, upper: bool) -> Result<Fp96, PoolError> {
        let slippage = self.pool_config.params.position_slippage;
        Self::fraction(if upper { Decimal::ONE + slippage } else { Decimal::ONE - slippage })
    }
}
