// 8.0: the margin pool state machine. accrual, trading, margin calls and emergency shutdown.
// deterministic, single threaded, no I/O. time only moves when the caller moves it.

mod accrual;
mod config;
mod core;
mod emergency;
mod liquidations;
mod results;
mod trading;

pub use config::EngineConfig;
pub use core::MarginPool;
pub use results::{CloseResult, MarginCallResult, Outcome, PoolError, PoolSnapshot, ReinitReport, TradeResult};
