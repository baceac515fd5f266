// 9.2 tokens.rs: MOCKED token transfers. balances per account and asset, nothing on chain.
// one pool token may be a wrapped native currency that unwraps on payout.

use crate::types::{AccountId, Asset};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("account {account} has {available} {asset}, needs {requested}")]
    InsufficientBalance {
        account: AccountId,
        asset: Asset,
        requested: u128,
        available: u128,
    },

    #[error("balance overflow for account {account}")]
    Overflow { account: AccountId },
}

#[derive(Debug, Clone, Default)]
pub struct Wallets {
    balances: HashMap<(AccountId, Asset), u128>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: AccountId, asset: Asset) -> u128 {
        self.balances.get(&(account, asset)).copied().unwrap_or(0)
    }

    // test and scenario faucet
    pub fn mint(&mut self, account: AccountId, asset: Asset, amount: u128) -> Result<(), TokenError> {
        self.credit(account, asset, amount)
    }

    pub fn credit(&mut self, account: AccountId, asset: Asset, amount: u128) -> Result<(), TokenError> {
        let entry = self.balances.entry((account, asset)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(TokenError::Overflow { account })?;
        Ok(())
    }

    pub fn debit(&mut self, account: AccountId, asset: Asset, amount: u128) -> Result<(), TokenError> {
        let available = self.balance(account, asset);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                account,
                asset,
                requested: amount,
                available,
            });
        }
        if amount > 0 {
            self.balances.insert((account, asset), available - amount);
        }
        Ok(())
    }
}

/// Asset actually paid out for a withdrawal of `asset`.
pub fn payout_asset(asset: Asset, wrapped_native: Option<Asset>, unwrap_native: bool) -> Asset {
    if unwrap_native && wrapped_native == Some(asset) {
        Asset::Native
    } else {
        asset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_fails_on_insufficient_balance() {
        let mut wallets = Wallets::new();
        wallets.mint(AccountId(1), Asset::Base, 100).unwrap();
        wallets.debit(AccountId(1), Asset::Base, 60).unwrap();
        assert_eq!(wallets.balance(AccountId(1), Asset::Base), 40);

        let err = wallets.debit(AccountId(1), Asset::Base, 41).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientBalance {
                account: AccountId(1),
                asset: Asset::Base,
                requested: 41,
                available: 40
            }
        );
        assert_eq!(wallets.balance(AccountId(1), Asset::Base), 40);
    }

    #[test]
    fn credit_overflow_rejected() {
        let mut wallets = Wallets::new();
        wallets.mint(AccountId(2), Asset::Quote, u128::MAX).unwrap();
        assert!(wallets.credit(AccountId(2), Asset::Quote, 1).is_err());
    }

    #[test]
    fn native_unwrap_only_for_wrapped_token() {
        assert_eq!(payout_asset(Asset::Base, Some(Asset::Base), true), Asset::Native);
        assert_eq!(payout_asset(Asset::Base, Some(Asset::Base), false), Asset::Base);
        assert_eq!(payout_asset(Asset::Quote, Some(Asset::Base), true), Asset::Quote);
        assert_eq!(payout_asset(Asset::Quote, None, true), Asset::Quote);
    }
}
