//! Error types for the NFS static provisioner
//!
//! Provides structured error types for the reconcilers, the cluster
//! adapters and the process wiring, plus the requeue classification the
//! controller error policies act on.

use crate::domain::builder::ValidationError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Cluster API operation kinds, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiOperation::Get => write!(f, "get"),
            ApiOperation::Create => write!(f, "create"),
            ApiOperation::Update => write!(f, "update"),
            ApiOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Claim Validation Errors
    // =========================================================================
    #[error("Invalid static provisioning annotations: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{operation} {kind}/{name} failed: {reason}")]
    ApiOperationFailed {
        operation: ApiOperation,
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("{operation} {kind}/{name} timed out after {after:?}")]
    Timeout {
        operation: ApiOperation,
        kind: &'static str,
        name: String,
        after: Duration,
    },

    // =========================================================================
    // Metrics Errors
    // =========================================================================
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // Serialization / IO Errors
    // =========================================================================
    #[error("YAML serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Build an `ApiOperationFailed` from any displayable cause
    pub fn api(
        operation: ApiOperation,
        kind: &'static str,
        name: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Error::ApiOperationFailed {
            operation,
            kind,
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Process setup problems never heal by retrying
            Error::Configuration(_) | Error::Serialization(_) | Error::Metrics(_) => {
                ErrorAction::NoRequeue
            }

            // Annotation errors surface as retryable; the same claim fails
            // again until an operator edits it, and the edit re-triggers us.
            Error::Validation(_) => ErrorAction::RequeueWithBackoff,

            // API failures and deadlines
            Error::Kube(_) | Error::ApiOperationFailed { .. } | Error::Timeout { .. } => {
                ErrorAction::RequeueWithBackoff
            }

            Error::Internal(_) | Error::Io(_) => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Kube(_) | Error::ApiOperationFailed { .. } | Error::Timeout { .. }
        )
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Internal(_) => "internal",
            Error::Configuration(_) => "configuration",
            Error::Validation(_) => "validation",
            Error::Kube(_) => "kube",
            Error::ApiOperationFailed { .. } => "api",
            Error::Timeout { .. } => "timeout",
            Error::Metrics(_) => "metrics",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;
