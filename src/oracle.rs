// Price oracle adapter
//
// The pool never prices anything itself. It asks an oracle for the spot price
// and a time weighted price of base in quote units, both Q96. The oracle is
// whatever wraps the external venue; `ConstantProductPool` is the one we ship.

use crate::fp96::{Fp96, MathError};
use crate::types::Timestamp;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no price observations recorded")]
    NoObservations,

    #[error("venue has no liquidity to price against")]
    EmptyReserves,

    #[error("oracle math: {0}")]
    Math(#[from] MathError),
}

/// Read-only price source. prices are quote units per one base unit.
pub trait PriceOracle {
    fn spot_price(&self) -> Result<Fp96, OracleError>;

    fn twap_price(&self, now: Timestamp, window_secs: u64) -> Result<Fp96, OracleError>;
}

/// TWAP over recorded (timestamp, price) samples.
/// The sample in force at the start of the window is kept so the whole window is covered.
#[derive(Debug, Clone)]
pub struct TwapCalculator {
    samples: VecDeque<(Timestamp, Fp96)>,
    retention_secs: u64,
    max_samples: usize,
}

impl TwapCalculator {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            retention_secs,
            max_samples: 1000,
        }
    }

    pub fn add_sample(&mut self, timestamp: Timestamp, price: Fp96) {
        // same second: the later price wins
        if let Some(last) = self.samples.back_mut() {
            if last.0 == timestamp {
                last.1 = price;
                return;
            }
        }
        self.samples.push_back((timestamp, price));

        // front sample is dead once its successor started before the retention horizon
        while self.samples.len() > 1 {
            let second_ts = self.samples[1].0;
            if timestamp.elapsed_since(second_ts) >= self.retention_secs {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<Fp96> {
        self.samples.back().map(|(_, p)| *p)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // 9.1: integrate each sample's price over the part of [now - window, now] it was in force.
    pub fn twap(&self, now: Timestamp, window_secs: u64) -> Result<Fp96, OracleError> {
        let Some(&(_, last_price)) = self.samples.back() else {
            return Err(OracleError::NoObservations);
        };
        if window_secs == 0 {
            return Ok(last_price);
        }

        let window_start = now.as_secs().saturating_sub(window_secs);
        let mut weighted_sum = Fp96::zero();
        let mut total_secs: u64 = 0;

        for (i, (ts, price)) in self.samples.iter().enumerate() {
            let seg_end = self
                .samples
                .get(i + 1)
                .map(|(next, _)| next.as_secs())
                .unwrap_or(now.as_secs())
                .min(now.as_secs());
            let seg_start = ts.as_secs().max(window_start);
            if seg_end <= seg_start {
                continue;
            }
            let duration = seg_end - seg_start;
            weighted_sum = weighted_sum.add(price.mul(Fp96::from_integer(duration as u128))?)?;
            total_secs += duration;
        }

        if total_secs == 0 {
            return Ok(last_price);
        }
        Ok(weighted_sum.div(Fp96::from_integer(total_secs as u128))?)
    }
}
