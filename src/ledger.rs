// 10.0 ledger.rs: account -> position map. an absent entry is an uninitialized position.

use crate::position::Position;
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionLedger {
    positions: BTreeMap<AccountId, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the position, `Uninitialized` if none.
    pub fn get(&self, account: AccountId) -> Position {
        self.positions.get(&account).copied().unwrap_or_default()
    }

    pub fn get_mut(&mut self, account: AccountId) -> Option<&mut Position> {
        self.positions.get_mut(&account)
    }

    pub fn get_or_create(&mut self, account: AccountId) -> &mut Position {
        self.positions.entry(account).or_insert_with(Position::lend)
    }

    pub fn set(&mut self, account: AccountId, position: Position) {
        if position.is_initialized() {
            self.positions.insert(account, position);
        } else {
            self.positions.remove(&account);
        }
    }

    pub fn clear(&mut self, account: AccountId) -> Option<Position> {
        self.positions.remove(&account)
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.positions.contains_key(&account)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositionType;

    #[test]
    fn absent_is_uninitialized() {
        let ledger = PositionLedger::new();
        assert_eq!(ledger.get(AccountId(1)).kind, PositionType::Uninitialized);
        assert!(ledger.is_empty());
    }

    #[test]
    fn create_then_clear() {
        let mut ledger = PositionLedger::new();
        ledger.get_or_create(AccountId(1)).discounted_base = 5;
        assert_eq!(ledger.get(AccountId(1)).kind, PositionType::Lend);
        assert_eq!(ledger.len(), 1);

        let cleared = ledger.clear(AccountId(1)).unwrap();
        assert_eq!(cleared.discounted_base, 5);
        assert!(!ledger.contains(AccountId(1)));
    }

    #[test]
    fn setting_uninitialized_removes() {
        let mut ledger = PositionLedger::new();
        ledger.get_or_create(AccountId(3));
        ledger.set(AccountId(3), Position::default());
        assert!(ledger.is_empty());
    }
}
