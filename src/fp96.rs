// 2.0 fp96.rs: Q96 fixed point. every coefficient, price and ratio in the pool is one of these.
// value = inner / 2^96. all ops are checked: overflow is an error, never a wrap.

use primitive_types::{U256, U512};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const RESOLUTION: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("fixed point overflow")]
    Overflow,

    #[error("fixed point underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,
}

fn q96() -> U256 {
    U256::one() << RESOLUTION
}

fn to_u128(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128())
}

/// `a * b / d` with a 512-bit intermediate.
pub fn mul_div(a: U256, b: U256, d: U256, round_up: bool) -> Result<U256, MathError> {
    if d.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = a.full_mul(b);
    let divisor = U512::from(d);
    let mut quotient = product / divisor;
    if round_up && !(product % divisor).is_zero() {
        quotient = quotient
            .checked_add(U512::one())
            .ok_or(MathError::Overflow)?;
    }
    if quotient > U512::from(U256::MAX) {
        return Err(MathError::Overflow);
    }
    let mut bytes = [0u8; 64];
    quotient.to_big_endian(&mut bytes);
    Ok(U256::from_big_endian(&bytes[32..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Fp96 {
    inner: U256,
}

impl Fp96 {
    pub fn zero() -> Self {
        Self { inner: U256::zero() }
    }

    pub fn one() -> Self {
        Self { inner: q96() }
    }

    pub fn max_value() -> Self {
        Self { inner: U256::MAX }
    }

    pub fn from_raw(inner: U256) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> U256 {
        self.inner
    }

    pub fn from_integer(value: u128) -> Self {
        Self {
            inner: U256::from(value) << RESOLUTION,
        }
    }

    /// num / den, rounded down.
    pub fn from_ratio(num: u128, den: u128) -> Result<Self, MathError> {
        let inner = mul_div(U256::from(num), q96(), U256::from(den), false)?;
        Ok(Self { inner })
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MathError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::Underflow);
        }
        let mantissa = U256::from(value.mantissa().unsigned_abs());
        let scale = U256::exp10(value.scale() as usize);
        let inner = mul_div(mantissa, q96(), scale, false)?;
        Ok(Self { inner })
    }

    /// Truncating conversion for reporting. saturates at `Decimal::MAX`.
    pub fn to_decimal(&self) -> Decimal {
        for scale in (0..=18u32).rev() {
            let Ok(scaled) = mul_div(self.inner, U256::exp10(scale as usize), q96(), false) else {
                continue;
            };
            if scaled > U256::from(i128::MAX as u128) {
                continue;
            }
            if let Ok(value) = Decimal::try_from_i128_with_scale(scaled.low_u128() as i128, scale) {
                return value.normalize();
            }
        }
        Decimal::MAX
    }

    pub fn is_zero(&self) -> bool {
        self.inner.is_zero()
    }

    pub fn add(self, other: Self) -> Result<Self, MathError> {
        let inner = self
            .inner
            .checked_add(other.inner)
            .ok_or(MathError::Overflow)?;
        Ok(Self { inner })
    }

    pub fn sub(self, other: Self) -> Result<Self, MathError> {
        let inner = self
            .inner
            .checked_sub(other.inner)
            .ok_or(MathError::Underflow)?;
        Ok(Self { inner })
    }

    pub fn mul(self, other: Self) -> Result<Self, MathError> {
        let inner = mul_div(self.inner, other.inner, q96(), false)?;
        Ok(Self { inner })
    }

    pub fn div(self, other: Self) -> Result<Self, MathError> {
        let inner = mul_div(self.inner, q96(), other.inner, false)?;
        Ok(Self { inner })
    }

    pub fn recip(self) -> Result<Self, MathError> {
        Self::one().div(self)
    }

    // 2.1: square-and-multiply. used to compound per-second rates over elapsed seconds.
    pub fn pow(self, exponent: u64) -> Result<Self, MathError> {
        let mut result = Self::one();
        let mut base = self;
        let mut remaining = exponent;
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.mul(base)?;
            }
            remaining >>= 1;
            if remaining > 0 {
                base = base.mul(base)?;
            }
        }
        Ok(result)
    }

    // 2.2: amount helpers. amounts are plain token units.
    pub fn mul_amount(&self, amount: u128) -> Result<u128, MathError> {
        to_u128(mul_div(self.inner, U256::from(amount), q96(), false)?)
    }

    pub fn mul_amount_up(&self, amount: u128) -> Result<u128, MathError> {
        to_u128(mul_div(self.inner, U256::from(amount), q96(), true)?)
    }

    /// amount / self, rounded down.
    pub fn div_amount(&self, amount: u128) -> Result<u128, MathError> {
        to_u128(mul_div(U256::from(amount), q96(), self.inner, false)?)
    }

    pub fn div_amount_up(&self, amount: u128) -> Result<u128, MathError> {
        to_u128(mul_div(U256::from(amount), q96(), self.inner, true)?)
    }
}

impl fmt::Display for Fp96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
