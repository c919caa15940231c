//! Cluster Adapters
//!
//! Provides the concrete implementations of the domain ports:
//! - Kubernetes API client and Event recorder
//! - In-memory cluster and recorder

pub mod kube_client;
pub mod memory;
pub mod recorder;

pub use kube_client::KubeClusterClient;
pub use memory::{InMemoryCluster, MemoryEventRecorder, Mutation};
pub use recorder::KubeEventRecorder;

/// Kind label for claims in errors and logs
pub const CLAIM_KIND: &str = "PersistentVolumeClaim";

/// Kind label for volumes in errors and logs
pub const VOLUME_KIND: &str = "PersistentVolume";
