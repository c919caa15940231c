//! Operator configuration
//!
//! Runtime settings assembled from the command line (see `main.rs`) and
//! validated before any controller starts.

use crate::controller::backoff::BackoffConfig;
use crate::controller::filter::EventFilter;
use crate::error::{Error, Result};
use std::time::Duration;

/// Default reporting component on Events
pub const DEFAULT_CONTROLLER_NAME: &str = "nfs-static-provisioner";

/// Upper bound the API server accepts for a watch timeout
pub const MAX_WATCH_TIMEOUT_SECS: u32 = 294;

/// Configuration for the controllers
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Reporting component on Events
    pub controller_name: String,
    /// Restrict the claim watch to one namespace
    pub watch_namespace: Option<String>,
    /// Deadline for each cluster API call
    pub request_timeout: Duration,
    /// Server-side watch timeout; must stay below the client read timeout
    pub watch_timeout_secs: u32,
    /// Requeue backoff for failed passes
    pub backoff: BackoffConfig,
    /// Change kinds that trigger claim reconciliation
    pub claim_filter: EventFilter,
    /// Change kinds that trigger volume reconciliation
    pub volume_filter: EventFilter,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            watch_namespace: None,
            request_timeout: Duration::from_secs(10),
            watch_timeout_secs: 290,
            backoff: BackoffConfig::default(),
            claim_filter: EventFilter::claims(),
            volume_filter: EventFilter::volumes(),
        }
    }
}

impl OperatorConfig {
    /// Reject settings the controllers cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.controller_name.trim().is_empty() {
            return Err(Error::Configuration("controller name must not be empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Configuration("request timeout must be positive".into()));
        }
        if self.watch_timeout_secs == 0 || self.watch_timeout_secs > MAX_WATCH_TIMEOUT_SECS {
            return Err(Error::Configuration(format!(
                "watch timeout must be between 1 and {} seconds, got {}",
                MAX_WATCH_TIMEOUT_SECS, self.watch_timeout_secs
            )));
        }
        if self.backoff.initial.is_zero() || self.backoff.max < self.backoff.initial {
            return Err(Error::Configuration(format!(
                "backoff must satisfy 0 < initial <= max, got {:?} / {:?}",
                self.backoff.initial, self.backoff.max
            )));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(Error::Configuration("backoff multiplier must be >= 1".into()));
        }
        if matches!(self.watch_namespace.as_deref(), Some("")) {
            return Err(Error::Configuration("watch namespace must not be empty".into()));
        }
        Ok(())
    }
}
