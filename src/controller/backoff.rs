//! Per-object requeue backoff
//!
//! Failed reconciliations are requeued with an exponentially growing,
//! capped delay tracked per object. A successful pass resets the object.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use dashmap::DashMap;
use std::time::Duration;

/// Backoff tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(300),
            multiplier: 2.0,
            randomization_factor: 0.1,
        }
    }
}

/// Backoff state keyed by object
pub struct RequeueBackoff {
    config: BackoffConfig,
    entries: DashMap<String, ExponentialBackoff>,
}

impl RequeueBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    fn fresh(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial)
            .with_max_interval(self.config.max)
            .with_multiplier(self.config.multiplier)
            .with_randomization_factor(self.config.randomization_factor)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Delay before the next attempt for `key`
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| self.fresh());
        entry.next_backoff().unwrap_or(self.config.max)
    }

    /// Forget the failure history of `key`
    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Number of objects currently backing off
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
