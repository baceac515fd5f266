// 6.1 margin_queue.rs: riskiest-first index of leveraged positions, one per side.
//
// Within a side every position shares the same coefficients and price, so
// leverage is a monotonic function of discounted debt / discounted collateral.
// Keying on that ratio keeps the order valid across accruals and price moves
// without ever re-sorting.

use crate::fp96::Fp96;
use crate::position::Position;
use crate::types::{AccountId, PositionType};
use priority_queue::PriorityQueue;

#[derive(Debug, Clone, Default)]
pub struct MarginQueue {
    queue: PriorityQueue<AccountId, Fp96>,
}

/// Ordering key for a leveraged position. no collateral sorts first.
pub fn risk_key(position: &Position) -> Fp96 {
    let (debt, collateral) = match position.kind {
        PositionType::Long => (position.discounted_quote, position.discounted_base),
        PositionType::Short => (position.discounted_base, position.discounted_quote),
        _ => return Fp96::zero(),
    };
    if collateral == 0 {
        return Fp96::max_value();
    }
    Fp96::from_ratio(debt, collateral).unwrap_or_else(|_| Fp96::max_value())
}

impl MarginQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, account: AccountId, position: &Position) {
        self.queue.push(account, risk_key(position));
    }

    pub fn remove(&mut self, account: AccountId) {
        self.queue.remove(&account);
    }

    /// Riskiest account on this side.
    pub fn peek(&self) -> Option<AccountId> {
        self.queue.peek().map(|(account, _)| *account)
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.queue.get(&account).is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(base: u128, quote_debt: u128) -> Position {
        Position { kind: PositionType::Long, discounted_base: base, discounted_quote: quote_debt }
    }

    #[test]
    fn riskiest_on_top() {
        let mut q = MarginQueue::new();
        q.upsert(AccountId(1), &long(100, 50));
        q.upsert(AccountId(2), &long(100, 80));
        q.upsert(AccountId(3), &long(100, 10));
        assert_eq!(q.peek(), Some(AccountId(2)));

        q.remove(AccountId(2));
        assert_eq!(q.peek(), Some(AccountId(1)));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn upsert_reprioritizes() {
        let mut q = MarginQueue::new();
        q.upsert(AccountId(1), &long(100, 50));
        q.upsert(AccountId(2), &long(100, 60));
        q.upsert(AccountId(1), &long(100, 90));
        assert_eq!(q.peek(), Some(AccountId(1)));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn short_key_uses_base_debt() {
        let short = Position { kind: PositionType::Short, discounted_base: 30, discounted_quote: 60 };
        assert_eq!(risk_key(&short), Fp96::from_ratio(1, 2).unwrap());
        let no_collateral = Position { discounted_quote: 0, ..short };
        assert_eq!(risk_key(&no_collateral), Fp96::max_value());
    }
}
