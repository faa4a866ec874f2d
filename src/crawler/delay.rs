//! Randomized politeness delay
//!
//! Waits between catalog pages and between retry attempts for a uniformly
//! random duration, so requests never arrive at a fixed cadence.

use rand::Rng;
use std::time::Duration;

/// Produces random waits within `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    min: Duration,
    max: Duration,
}

impl DelayPolicy {
    /// Creates a policy; the bounds are swapped if given in the wrong order
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// A policy that never waits
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws the next wait duration
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Suspends the caller for a random duration; returns the time waited
    pub async fn wait(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::debug!("Waiting {:?} before next request", delay);
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
