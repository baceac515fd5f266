// 4.0: positions store discounted balances. real = coefficient * discounted.
// 4.1 has the coefficient set and the discount/undiscount helpers.
// collateral rounds down, debt rounds up, so the pool never owes more than it holds.

use crate::fp96::{Fp96, MathError};
use crate::types::{Asset, PositionType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub kind: PositionType,
    pub discounted_base: u128,
    pub discounted_quote: u128,
}

impl Position {
    pub fn lend() -> Self {
        Self {
            kind: PositionType::Lend,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.discounted_base == 0 && self.discounted_quote == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.kind != PositionType::Uninitialized
    }

    // Lend holds collateral on both sides, so only leveraged positions have a single one
    pub fn collateral_asset(&self) -> Option<Asset> {
        match self.kind {
            PositionType::Long => Some(Asset::Base),
            PositionType::Short => Some(Asset::Quote),
            _ => None,
        }
    }

    pub fn debt_asset(&self) -> Option<Asset> {
        self.collateral_asset().map(|a| a.other())
    }

    /// Whether the discounted amount of `asset` is a collateral claim for this position.
    pub fn holds_collateral_in(&self, asset: Asset) -> bool {
        match self.kind {
            PositionType::Lend => true,
            PositionType::Long | PositionType::Short => self.collateral_asset() == Some(asset),
            PositionType::Uninitialized => false,
        }
    }

    pub fn discounted(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Base => self.discounted_base,
            Asset::Quote => self.discounted_quote,
            Asset::Native => 0,
        }
    }

    pub fn discounted_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::Quote => &mut self.discounted_quote,
            _ => &mut self.discounted_base,
        }
    }
}

/// Real amounts of a position at the current coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RealPosition {
    pub kind: PositionType,
    pub base_collateral: u128,
    pub base_debt: u128,
    pub quote_collateral: u128,
    pub quote_debt: u128,
}

impl RealPosition {
    pub fn collateral(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Base => self.base_collateral,
            Asset::Quote => self.quote_collateral,
            Asset::Native => 0,
        }
    }

    pub fn debt(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Base => self.base_debt,
            Asset::Quote => self.quote_debt,
            Asset::Native => 0,
        }
    }
}

// 4.1: the four pool coefficients. all start at one and only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coefficients {
    pub base_collateral: Fp96,
    pub base_debt: Fp96,
    pub quote_collateral: Fp96,
    pub quote_debt: Fp96,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            base_collateral: Fp96::one(),
            base_debt: Fp96::one(),
            quote_collateral: Fp96::one(),
            quote_debt: Fp96::one(),
        }
    }
}

impl Coefficients {
    pub fn collateral(&self, asset: Asset) -> Fp96 {
        match asset {
            Asset::Quote => self.quote_collateral,
            _ => self.base_collateral,
        }
    }

    pub fn debt(&self, asset: Asset) -> Fp96 {
        match asset {
            Asset::Quote => self.quote_debt,
            _ => self.base_debt,
        }
    }

    pub fn collateral_mut(&mut self, asset: Asset) -> &mut Fp96 {
        match asset {
            Asset::Quote => &mut self.quote_collateral,
            _ => &mut self.base_collateral,
        }
    }

    pub fn debt_mut(&mut self, asset: Asset) -> &mut Fp96 {
        match asset {
            Asset::Quote => &mut self.quote_debt,
            _ => &mut self.base_debt,
        }
    }

    pub fn real_collateral(&self, asset: Asset, discounted: u128) -> Result<u128, MathError> {
        self.collateral(asset).mul_amount(discounted)
    }

    pub fn real_debt(&self, asset: Asset, discounted: u128) -> Result<u128, MathError> {
        self.debt(asset).mul_amount_up(discounted)
    }

    /// Discounted units credited for a real collateral amount.
    pub fn discount_collateral(&self, asset: Asset, amount: u128) -> Result<u128, MathError> {
        self.collateral(asset).div_amount(amount)
    }

    /// Discounted units removed when `amount` of collateral leaves.
    pub fn discount_collateral_up(&self, asset: Asset, amount: u128) -> Result<u128, MathError> {
        self.collateral(asset).div_amount_up(amount)
    }

    pub fn discount_debt(&self, asset: Asset, amount: u128) -> Result<u128, MathError> {
        self.debt(asset).div_amount_up(amount)
    }

    /// Discounted units cleared by repaying `amount`.
    pub fn discount_repayment(&self, asset: Asset, amount: u128) -> Result<u128, MathError> {
        self.debt(asset).div_amount(amount)
    }

    pub fn real_position(&self, position: &Position) -> Result<RealPosition, MathError> {
        let mut real = RealPosition {
            kind: position.kind,
            ..RealPosition::default()
        };
        match position.kind {
            PositionType::Uninitialized => {}
            PositionType::Lend => {
                real.base_collateral = self.real_collateral(Asset::Base, position.discounted_base)?;
                real.quote_collateral = self.real_collateral(Asset::Quote, position.discounted_quote)?;
            }
            PositionType::Long => {
                real.base_collateral = self.real_collateral(Asset::Base, position.discounted_base)?;
                real.quote_debt = self.real_debt(Asset::Quote, position.discounted_quote)?;
            }
            PositionType::Short => {
                real.quote_collateral = self.real_collateral(Asset::Quote, position.discounted_quote)?;
                real.base_debt = self.real_debt(Asset::Base, position.discounted_base)?;
            }
        }
        Ok(real)
    }
}

// 4.2: pool wide sums of discounted balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscountedTotals {
    pub base_collateral: u128,
    pub base_debt: u128,
    pub quote_collateral: u128,
    pub quote_debt: u128,
}

impl DiscountedTotals {
    pub fn collateral(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Quote => self.quote_collateral,
            _ => self.base_collateral,
        }
    }

    pub fn debt(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Quote => self.quote_debt,
            _ => self.base_debt,
        }
    }

    pub fn collateral_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::Quote => &mut self.quote_collateral,
            _ => &mut self.base_collateral,
        }
    }

    pub fn debt_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::Quote => &mut self.quote_debt,
            _ => &mut self.base_debt,
        }
    }
}
