// 1.0: all the primitives live here. ids, timestamps, assets, position kinds, pool modes.
// each is a newtype or enum so the compiler catches mixups between base and quote.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 1.1: the two pool tokens plus the native currency a wrapped token unwraps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Base,
    Quote,
    Native,
}

impl Asset {
    pub fn other(&self) -> Self {
        match self {
            Asset::Base => Asset::Quote,
            Asset::Quote => Asset::Base,
            Asset::Native => Asset::Native,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Base => write!(f, "base"),
            Asset::Quote => write!(f, "quote"),
            Asset::Native => write!(f, "native"),
        }
    }
}

// 1.2: Lend = collateral only. Long = base collateral, quote debt. Short = quote collateral, base debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositionType {
    #[default]
    Uninitialized,
    Lend,
    Long,
    Short,
}

impl PositionType {
    pub fn is_leveraged(&self) -> bool {
        matches!(self, PositionType::Long | PositionType::Short)
    }
}

// 1.3: Regular -> ShortEmergency | LongEmergency. both emergency modes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PoolMode {
    #[default]
    Regular,
    ShortEmergency,
    LongEmergency,
}

impl PoolMode {
    pub fn is_emergency(&self) -> bool {
        !matches!(self, PoolMode::Regular)
    }
}

// 1.4: direction of a venue swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    QuoteToBase,
    BaseToQuote,
}

impl SwapDirection {
    pub fn input(&self) -> Asset {
        match self {
            SwapDirection::QuoteToBase => Asset::Quote,
            SwapDirection::BaseToQuote => Asset::Base,
        }
    }

    pub fn output(&self) -> Asset {
        self.input().other()
    }
}

// 1.5: second resolution timestamp. the pool never reads a wall clock on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn elapsed_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;
