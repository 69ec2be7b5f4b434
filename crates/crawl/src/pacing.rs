// ABOUTME: Randomized pauses used for pacing between browser actions.
// ABOUTME: Pauses never gate correctness; every readiness check is a bounded wait elsewhere.

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A uniformly random pause between `min_ms` and `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pause {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Pause {
    pub const fn millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn none() -> Self {
        Self::millis(0, 0)
    }

    pub fn sample(&self) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    pub fn sleep(&self) {
        let d = self.sample();
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}
