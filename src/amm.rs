// 9.3 amm.rs: the external venue the pool trades against and reads prices from.
// x*y=k with a ppm fee. stands in for the constant-product / concentrated-liquidity pool.

use crate::fp96::{mul_div, Fp96, MathError};
use crate::oracle::{OracleError, PriceOracle, TwapCalculator};
use crate::types::{SwapDirection, Timestamp};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

const PPM: u128 = 1_000_000;

// Errors from swap execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("swap amount is zero")]
    ZeroAmount,

    #[error("swap output {amount_out} below minimum {min_amount_out}")]
    InsufficientOutput { amount_out: u128, min_amount_out: u128 },

    #[error("swap input {amount_in} above maximum {max_amount_in}")]
    ExcessiveInput { amount_in: u128, max_amount_in: u128 },

    #[error("venue reserves cannot supply {requested}")]
    InsufficientReserves { requested: u128 },

    #[error("unknown venue index {0}")]
    UnknownVenue(usize),

    #[error("swap math: {0}")]
    Math(#[from] MathError),
}

/// Something that can execute swaps between base and quote.
pub trait SwapVenue {
    fn quote_exact_input(&self, direction: SwapDirection, amount_in: u128) -> Result<u128, SwapError>;

    fn quote_exact_output(&self, direction: SwapDirection, amount_out: u128) -> Result<u128, SwapError>;

    /// Returns the amount received.
    fn swap_exact_input(
        &mut self,
        now: Timestamp,
        direction: SwapDirection,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, SwapError>;

    /// Returns the amount paid.
    fn swap_exact_output(
        &mut self,
        now: Timestamp,
        direction: SwapDirection,
        max_amount_in: u128,
        amount_out: u128,
    ) -> Result<u128, SwapError>;
}

fn narrow(value: U256) -> Result<u128, SwapError> {
    if value > U256::from(u128::MAX) {
        return Err(SwapError::Math(MathError::Overflow));
    }
    Ok(value.low_u128())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    // fee charged on input, parts per million
    pub fee_ppm: u32,
    // how long price samples are kept for the twap
    pub twap_retention_secs: u64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            fee_ppm: 500, // 0.05%
            twap_retention_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantProductPool {
    base_reserve: u128,
    quote_reserve: u128,
    fee_ppm: u32,
    twap: TwapCalculator,
}

impl ConstantProductPool {
    pub fn new(base_reserve: u128, quote_reserve: u128, config: VenueConfig, now: Timestamp) -> Self {
        let mut pool = Self {
            base_reserve,
            quote_reserve,
            fee_ppm: config.fee_ppm,
            twap: TwapCalculator::new(config.twap_retention_secs),
        };
        pool.record(now);
        pool
    }

    // fixtures: 1 base = 1 quote
    pub fn at_parity(depth: u128, now: Timestamp) -> Self {
        Self::new(depth, depth, VenueConfig::default(), now)
    }

    pub fn with_price(depth: u128, price: Fp96, now: Timestamp) -> Result<Self, SwapError> {
        let quote_reserve = price.mul_amount(depth)?;
        Ok(Self::new(depth, quote_reserve, VenueConfig::default(), now))
    }

    pub fn reserves(&self) -> (u128, u128) {
        (self.base_reserve, self.quote_reserve)
    }

    pub fn fee_ppm(&self) -> u32 {
        self.fee_ppm
    }

    /// Moves the price by rebalancing the quote reserve. base depth is unchanged.
    pub fn set_price(&mut self, now: Timestamp, price: Fp96) -> Result<(), SwapError> {
        self.quote_reserve = price.mul_amount(self.base_reserve)?;
        self.record(now);
        Ok(())
    }

    pub fn set_reserves(&mut self, now: Timestamp, base_reserve: u128, quote_reserve: u128) {
        self.base_reserve = base_reserve;
        self.quote_reserve = quote_reserve;
        self.record(now);
    }

    fn record(&mut self, now: Timestamp) {
        if let Ok(price) = Fp96::from_ratio(self.quote_reserve, self.base_reserve) {
            self.twap.add_sample(now, price);
        }
    }

    fn reserves_for(&self, direction: SwapDirection) -> (u128, u128) {
        match direction {
            SwapDirection::QuoteToBase => (self.quote_reserve, self.base_reserve),
            SwapDirection::BaseToQuote => (self.base_reserve, self.quote_reserve),
        }
    }

    fn apply(&mut self, direction: SwapDirection, amount_in: u128, amount_out: u128) -> Result<(), SwapError> {
        let overflow = SwapError::Math(MathError::Overflow);
        match direction {
            SwapDirection::QuoteToBase => {
                self.quote_reserve = self.quote_reserve.checked_add(amount_in).ok_or(overflow)?;
                self.base_reserve -= amount_out;
            }
            SwapDirection::BaseToQuote => {
                self.base_reserve = self.base_reserve.checked_add(amount_in).ok_or(overflow)?;
                self.quote_reserve -= amount_out;
            }
        }
        Ok(())
    }
}

impl PriceOracle for ConstantProductPool {
    fn spot_price(&self) -> Result<Fp96, OracleError> {
        if self.base_reserve == 0 || self.quote_reserve == 0 {
            return Err(OracleError::EmptyReserves);
        }
        Ok(Fp96::from_ratio(self.quote_reserve, self.base_reserve)?)
    }

    fn twap_price(&self, now: Timestamp, window_secs: u64) -> Result<Fp96, OracleError> {
        self.twap.twap(now, window_secs)
    }
}

impl SwapVenue for ConstantProductPool {
    fn quote_exact_input(&self, direction: SwapDirection, amount_in: u128) -> Result<u128, SwapError> {
        if amount_in == 0 {
            return Err(SwapError::ZeroAmount);
        }
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        let fee_keep = U256::from(PPM - self.fee_ppm as u128);
        let in_after_fee = mul_div(U256::from(amount_in), fee_keep, U256::from(PPM), false)?;
        let denominator = U256::from(reserve_in)
            .checked_add(in_after_fee)
            .ok_or(MathError::Overflow)?;
        let out = mul_div(U256::from(reserve_out), in_after_fee, denominator, false)?;
        narrow(out)
    }

    fn quote_exact_output(&self, direction: SwapDirection, amount_out: u128) -> Result<u128, SwapError> {
        if amount_out == 0 {
            return Err(SwapError::ZeroAmount);
        }
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        if amount_out >= reserve_out {
            return Err(SwapError::InsufficientReserves { requested: amount_out });
        }
        let in_after_fee = mul_div(
            U256::from(reserve_in),
            U256::from(amount_out),
            U256::from(reserve_out - amount_out),
            true,
        )?;
        let fee_keep = U256::from(PPM - self.fee_ppm as u128);
        let amount_in = mul_div(in_after_fee, U256::from(PPM), fee_keep, true)?;
        narrow(amount_in)
    }

    fn swap_exact_input(
        &mut self,
        now: Timestamp,
        direction: SwapDirection,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, SwapError> {
        let amount_out = self.quote_exact_input(direction, amount_in)?;
        if amount_out < min_amount_out {
            return Err(SwapError::InsufficientOutput { amount_out, min_amount_out });
        }
        self.apply(direction, amount_in, amount_out)?;
        self.record(now);
        Ok(amount_out)
    }

    fn swap_exact_output(
        &mut self,
        now: Timestamp,
        direction: SwapDirection,
        max_amount_in: u128,
        amount_out: u128,
    ) -> Result<u128, SwapError> {
        let amount_in = self.quote_exact_output(direction, amount_out)?;
        if amount_in > max_amount_in {
            return Err(SwapError::ExcessiveInput { amount_in, max_amount_in });
        }
        self.apply(direction, amount_in, amount_out)?;
        self.record(now);
        Ok(amount_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DEPTH: u128 = 1_000_000_000_000;

    fn t(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn parity_spot_price_is_one() {
        let pool = ConstantProductPool::at_parity(DEPTH, t(0));
        assert_eq!(pool.spot_price().unwrap(), Fp96::one());
    }

    #[test]
    fn skewed_fixtures_price_both_ways() {
        let dear_base = ConstantProductPool::with_price(DEPTH, Fp96::from_integer(4), t(0)).unwrap();
        assert_eq!(dear_base.spot_price().unwrap().to_decimal(), dec!(4));

        let cheap_base =
            ConstantProductPool::with_price(DEPTH, Fp96::from_decimal(dec!(0.25)).unwrap(), t(0)).unwrap();
        assert_eq!(cheap_base.spot_price().unwrap().to_decimal(), dec!(0.25));
    }

    #[test]
    fn exact_input_has_price_impact_and_fee() {
        let mut pool = ConstantProductPool::at_parity(DEPTH, t(0));
        let amount_in = DEPTH / 100;
        let out = pool
            .swap_exact_input(t(1), SwapDirection::QuoteToBase, amount_in, 0)
            .unwrap();
        assert!(out < amount_in);
        // 1% of depth costs roughly 1% impact
        assert!(out > amount_in * 98 / 100);
        let (base, quote) = pool.reserves();
        assert_eq!(base, DEPTH - out);
        assert_eq!(quote, DEPTH + amount_in);
        assert!(pool.spot_price().unwrap() > Fp96::one());
    }

    #[test]
    fn exact_output_round_trips_with_quote() {
        let mut pool = ConstantProductPool::at_parity(DEPTH, t(0));
        let want = 5_000_000u128;
        let cost = pool.quote_exact_output(SwapDirection::BaseToQuote, want).unwrap();
        let paid = pool
            .swap_exact_output(t(1), SwapDirection::BaseToQuote, cost, want)
            .unwrap();
        assert_eq!(paid, cost);
        assert!(cost > want);
        // feeding the paid amount back in as exact input yields at least the output
        let fresh = ConstantProductPool::at_parity(DEPTH, t(0));
        assert!(fresh.quote_exact_input(SwapDirection::BaseToQuote, cost).unwrap() >= want);
    }

    #[test]
    fn slippage_guards() {
        let mut pool = ConstantProductPool::at_parity(DEPTH, t(0));
        let err = pool
            .swap_exact_input(t(1), SwapDirection::BaseToQuote, 1_000, 1_000)
            .unwrap_err();
        assert!(matches!(err, SwapError::InsufficientOutput { .. }));

        let err = pool
            .swap_exact_output(t(1), SwapDirection::BaseToQuote, 1_000, 1_000)
            .unwrap_err();
        assert!(matches!(err, SwapError::ExcessiveInput { .. }));

        let err = pool
            .swap_exact_output(t(1), SwapDirection::BaseToQuote, u128::MAX, DEPTH)
            .unwrap_err();
        assert!(matches!(err, SwapError::InsufficientReserves { .. }));
        // nothing moved
        assert_eq!(pool.reserves(), (DEPTH, DEPTH));
    }

    #[test]
    fn set_price_feeds_twap() {
        let mut pool = ConstantProductPool::at_parity(DEPTH, t(0));
        pool.set_price(t(100), Fp96::from_integer(2)).unwrap();
        assert_eq!(pool.twap_price(t(200), 200).unwrap().to_decimal(), dec!(1.5));
        assert_eq!(pool.twap_price(t(10_000), 900).unwrap(), Fp96::from_integer(2));
    }
}
