// margin-pool: leveraged margin trading pool.
// lenders supply base and quote, traders borrow one against the other.
// balances are stored discounted; interest moves coefficients, never positions.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, Asset, PositionType, PoolMode, Timestamp
//   2.x  fp96.rs: Q96 fixed point and rounding helpers
//   4.x  position.rs: discounted positions, coefficients, totals
//   5.x  interest.rs: utilization curve and per-second compounding
//   6.0  risk.rs: leverage, ceilings, margin call threshold
//   6.1  margin_queue.rs: riskiest-first index per side
//   6.2  insurance.rs: per-token insurance funds
//   7.x  config.rs: params, rate curve, token metadata, env presets
//   8.x  engine/: the pool: accrual, trading, margin calls, emergency
//   8.6  shared.rs: lock wrapper for concurrent callers
//   8.7  keeper.rs: liquidation helper built on receive_position
//   9.x  oracle.rs: price oracle trait and twap
//   9.2  tokens.rs: token wallets (mocked)
//   9.3  amm.rs: constant product venue (mocked)
//   9.4  router.rs: swap routing across venues
//   10.x ledger.rs: account -> position map
//   11.x events.rs: state transition events for audit

// core pool modules
pub mod engine;
pub mod events;
pub mod fp96;
pub mod interest;
pub mod ledger;
pub mod position;
pub mod types;

// risk and safety modules
pub mod insurance;
pub mod margin_queue;
pub mod risk;

// integration modules
pub mod amm;
pub mod config;
pub mod keeper;
pub mod oracle;
pub mod router;
pub mod shared;
pub mod tokens;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use fp96::{Fp96, MathError};
pub use position::*;
pub use risk::{Leverage, RiskError};
pub use types::*;
pub use amm::{ConstantProductPool, SwapError, SwapVenue, VenueConfig};
pub use config::{ConfigError, Environment, PoolConfig, PoolParams, RateCurve, TokenConfig};
pub use insurance::{InsuranceFund, InsuranceFunds};
pub use keeper::{KeeperError, LiquidationKeeper, LiquidationReport};
pub use ledger::PositionLedger;
pub use oracle::{OracleError, PriceOracle, TwapCalculator};
pub use router::{SwapCallData, SwapRouter};
pub use shared::SharedPool;
pub use tokens::{TokenError, Wallets};
