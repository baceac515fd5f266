// 8.0.1 engine/config.rs: runtime knobs for the pool itself. market params live in crate::config.

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Oldest events are dropped past this many.
    pub max_events: usize,
    /// Mirror every recorded event to the debug log.
    pub verbose: bool,
    /// Record a Reinit event for each accrual step. long simulations with
    /// frequent reinits can turn this off to keep the log to state changes.
    pub record_accruals: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
            record_accruals: true,
        }
    }
}
