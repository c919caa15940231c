//! NFS Static Provisioner
//!
//! A Kubernetes controller that provisions NFS-backed PersistentVolumes for
//! PersistentVolumeClaims annotated for static provisioning, and removes
//! those volumes once they are released under a `Delete` reclaim policy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          Controller Runner                           │
//! │        watch → ChangeClassifier → EventFilter → Controller           │
//! ├──────────────────────────────────┬───────────────────────────────────┤
//! │         Claim Reconciler         │         Volume Reconciler         │
//! │  precheck → build descriptor →   │  marker + Delete policy +         │
//! │  assign volumeName | create PV   │  Released/Failed → delete PV      │
//! ├──────────────────────────────────┴───────────────────────────────────┤
//! │                              Domain                                  │
//! │   annotations · StaticClaim · VolumeDescriptor · StaticVolume · ports│
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                         Cluster Adapters                             │
//! │   KubeClusterClient · KubeEventRecorder · InMemoryCluster            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Claim and volume views, the descriptor builder and ports
//! - [`controller`]: Reconcilers, change filtering and runtime wiring
//! - [`cluster`]: Kubernetes and in-memory port implementations
//! - [`config`]: Operator configuration
//! - [`metrics`]: Prometheus collectors
//! - [`rbac`]: ClusterRole manifest
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod rbac;

// Re-export commonly used types
pub use cluster::{InMemoryCluster, KubeClusterClient, KubeEventRecorder, MemoryEventRecorder};

pub use config::OperatorConfig;

pub use controller::{
    build_controllers, BackoffConfig, ClaimOutcome, ClaimReconciler, Context, EventFilter,
    Readiness, VolumeOutcome, VolumeReconciler,
};

pub use domain::{
    build_volume, AuditEvent, ClusterClient, EventRecorder, ReclaimPolicy, StaticClaim,
    StaticVolume, ValidationError, VolumeDescriptor,
};

pub use error::{Error, ErrorAction, Result};

pub use metrics::ControllerMetrics;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
