// 6.2 insurance.rs: protocol fees accumulate here, one fund per pool token.
// bad debt from a margin call is paid out of the fund of the debt asset.

use crate::types::Asset;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsuranceFund {
    pub balance: u128,
    pub total_deposits: u128,
    pub total_payouts: u128,
}

impl InsuranceFund {
    pub fn new(initial_balance: u128) -> Self {
        Self {
            balance: initial_balance,
            total_deposits: initial_balance,
            total_payouts: 0,
        }
    }

    pub fn deposit(&mut self, amount: u128) {
        self.balance = self.balance.saturating_add(amount);
        self.total_deposits = self.total_deposits.saturating_add(amount);
    }

    pub fn can_cover(&self, amount: u128) -> bool {
        self.balance >= amount
    }

    /// Pays out at most the balance and returns what was paid.
    pub fn cover_bad_debt(&mut self, amount: u128) -> u128 {
        let covered = amount.min(self.balance);
        self.balance -= covered;
        self.total_payouts = self.total_payouts.saturating_add(covered);
        covered
    }

    /// Empties the fund. used when the pool winds down.
    pub fn drain(&mut self) -> u128 {
        let amount = self.balance;
        self.balance = 0;
        self.total_payouts = self.total_payouts.saturating_add(amount);
        amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsuranceFunds {
    pub base: InsuranceFund,
    pub quote: InsuranceFund,
}

impl InsuranceFunds {
    pub fn get(&self, asset: Asset) -> &InsuranceFund {
        match asset {
            Asset::Quote => &self.quote,
            _ => &self.base,
        }
    }

    pub fn get_mut(&mut self, asset: Asset) -> &mut InsuranceFund {
        match asset {
            Asset::Quote => &mut self.quote,
            _ => &mut self.base,
        }
    }
}
