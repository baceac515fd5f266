// 5.0: interest accrual. borrowers pay the curve rate plus the protocol fee, compounded per second.
// 5.1 computes one side's factors, the engine applies them to the coefficients.

use crate::config::RateCurve;
use crate::fp96::{Fp96, MathError};
use rust_decimal::Decimal;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideAccrual {
    pub annual_rate: Decimal,
    // multiply the debt coefficient by this
    pub debt_factor: Fp96,
    // multiply the collateral coefficient by this
    pub collateral_factor: Fp96,
    // real interest credited to lenders
    pub interest: u128,
    // real fee owed to the protocol on top of interest
    pub fee: u128,
}

impl SideAccrual {
    pub fn none() -> Self {
        Self {
            annual_rate: Decimal::ZERO,
            debt_factor: Fp96::one(),
            collateral_factor: Fp96::one(),
            interest: 0,
            fee: 0,
        }
    }
}

pub fn utilization(real_collateral: u128, real_debt: u128) -> Decimal {
    if real_collateral == 0 {
        return if real_debt == 0 { Decimal::ZERO } else { Decimal::ONE };
    }
    match Fp96::from_ratio(real_debt, real_collateral) {
        Ok(ratio) => ratio.to_decimal(),
        Err(_) => Decimal::ONE,
    }
}

// (1 + annual / year)^elapsed
pub fn compound(annual: Decimal, elapsed_secs: u64) -> Result<Fp96, MathError> {
    let per_second = Fp96::from_decimal(annual)?.div(Fp96::from_integer(SECONDS_PER_YEAR as u128))?;
    Fp96::one().add(per_second)?.pow(elapsed_secs)
}

// 5.1: interest paid by one asset's borrowers to the same asset's lenders.
pub fn compute_side_accrual(
    elapsed_secs: u64,
    real_collateral: u128,
    real_debt: u128,
    curve: &RateCurve,
    fee: Decimal,
) -> Result<SideAccrual, MathError> {
    if elapsed_secs == 0 || real_debt == 0 {
        return Ok(SideAccrual::none());
    }

    let annual_rate = curve.annual_rate(utilization(real_collateral, real_debt));
    let interest_growth = compound(annual_rate, elapsed_secs)?;
    let fee_growth = compound(fee, elapsed_secs)?;
    let debt_factor = interest_growth.mul(fee_growth)?;

    let interest = interest_growth.sub(Fp96::one())?.mul_amount(real_debt)?;
    let new_debt = debt_factor.mul_amount(real_debt)?;
    let fee_amount = new_debt.saturating_sub(real_debt).saturating_sub(interest);

    let collateral_factor = if real_collateral == 0 {
        Fp96::one()
    } else {
        Fp96::one().add(Fp96::from_ratio(interest, real_collateral)?)?
    };

    Ok(SideAccrual {
        annual_rate,
        debt_factor,
        collateral_factor,
        interest,
        fee: fee_amount,
    })
}
