// 8.6 shared.rs: one lock per pool. mutations are serialized, reads work off a snapshot.

use crate::amm::SwapVenue;
use crate::engine::{MarginPool, PoolSnapshot};
use crate::oracle::PriceOracle;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct SharedPool<V> {
    inner: Arc<Mutex<MarginPool<V>>>,
}

impl<V> Clone for SharedPool<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: PriceOracle + SwapVenue + Clone> SharedPool<V> {
    pub fn new(pool: MarginPool<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    // execute restores the pool before a panic can reach the lock
    fn lock(&self) -> MutexGuard<'_, MarginPool<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` with exclusive access to the pool. if `op` panics the pool is put
    /// back the way it was before the panic is passed on.
    pub fn execute<R>(&self, op: impl FnOnce(&mut MarginPool<V>) -> R) -> R {
        let mut guard = self.lock();
        let checkpoint = guard.checkpoint();
        match panic::catch_unwind(AssertUnwindSafe(|| op(&mut guard))) {
            Ok(result) => result,
            Err(payload) => {
                guard.restore(checkpoint);
                drop(guard);
                panic::resume_unwind(payload)
            }
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::ConstantProductPool;
    use crate::config::PoolConfig;
    use crate::engine::EngineConfig;
    use crate::types::{AccountId, Asset, Timestamp};
    use std::thread;

    #[test]
    fn concurrent_deposits_are_serialized() {
        let venue = ConstantProductPool::at_parity(1_000_000_000, Timestamp::from_secs(0));
        let pool = MarginPool::new(PoolConfig::default(), EngineConfig::default(), venue).unwrap();
        let shared = SharedPool::new(pool);

        let handles: Vec<_> = (1..=8u64)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.execute(|pool| {
                        pool.mint(AccountId(i), Asset::Quote, 1_000).unwrap();
                        pool.deposit_quote(AccountId(i), 1_000).unwrap();
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.quote_holdings, 8_000);
        assert_eq!(snapshot.totals.quote_collateral, 8_000);
        assert_eq!(snapshot.positions, 8);
    }

    #[test]
    fn panic_mid_operation_restores_pool() {
        let venue = ConstantProductPool::at_parity(1_000_000_000, Timestamp::from_secs(0));
        let pool = MarginPool::new(PoolConfig::default(), EngineConfig::default(), venue).unwrap();
        let shared = SharedPool::new(pool);
        shared.execute(|pool| {
            pool.mint(AccountId(1), Asset::Base, 1_000).unwrap();
            pool.deposit_base(AccountId(1), 1_000).unwrap();
        });
        let before = shared.snapshot();

        let worker = shared.clone();
        let joined = thread::spawn(move || {
            let _: () = worker.execute(|pool| {
                pool.mint(AccountId(2), Asset::Base, 500).unwrap();
                pool.deposit_base(AccountId(2), 500).unwrap();
                panic!("operator closure failed");
            });
        })
        .join();

        assert!(joined.is_err());
        assert_eq!(shared.snapshot(), before);
        let (balance, events) = shared.execute(|pool| (pool.balance_of(AccountId(2), Asset::Base), pool.events().len()));
        assert_eq!(balance, 0);
        assert_eq!(events, 1);
    }
}
