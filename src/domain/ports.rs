//! Domain Ports - Core trait definitions for the provisioner
//!
//! These traits define the boundaries between the reconciliation logic and
//! the cluster. Adapters implement these traits to provide concrete
//! functionality; reconcilers receive them at construction.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolume, PersistentVolumeClaim};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Cluster Client Port
// =============================================================================

/// Port for reading and mutating claims and volumes
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a claim. A missing claim is `Ok(None)`.
    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>>;

    /// Replace a claim with the given object
    async fn update_claim(&self, claim: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim>;

    /// Fetch a volume. A missing volume is `Ok(None)`.
    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>>;

    /// Create a volume; fails if the name is taken
    async fn create_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume>;

    /// Delete a volume. Deleting an absent volume succeeds.
    async fn delete_volume(&self, name: &str) -> Result<()>;
}

// =============================================================================
// Event Recorder Port
// =============================================================================

/// Severity of an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Normal,
    Warning,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Normal => write!(f, "Normal"),
            EventKind::Warning => write!(f, "Warning"),
        }
    }
}

/// Human-readable narration attached to a claim or volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub kind: EventKind,
    pub reason: &'static str,
    pub action: &'static str,
    pub note: String,
}

impl AuditEvent {
    pub fn normal(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Normal,
            reason,
            action,
            note: note.into(),
        }
    }

    pub fn warning(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Warning,
            reason,
            action,
            note: note.into(),
        }
    }
}

/// Port for publishing audit events.
///
/// Implementations are fire-and-forget: a failed publish is logged and
/// never fails the reconciliation that emitted it.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, regarding: &ObjectReference, event: AuditEvent);
}

/// Well-known event reason strings
pub mod reasons {
    pub const PV_PARSED: &str = "PVParsed";
    pub const PARSE_PV_FAILED: &str = "ParsePVFailed";
    pub const VOLUME_NAME_UPDATED: &str = "VolumeNameUpdated";
    pub const UPDATE_VOLUME_NAME_FAILED: &str = "UpdateVolumeNameFailed";
    pub const PV_CREATED: &str = "PVCreated";
    pub const CREATE_PV_FAILED: &str = "CreatePVFailed";
    pub const PV_DELETED: &str = "PVDeleted";
    pub const DELETE_PV_FAILED: &str = "DeletePVFailed";
}

/// Well-known event action strings
pub mod actions {
    pub const PARSE: &str = "ParseVolume";
    pub const UPDATE_CLAIM: &str = "UpdateClaim";
    pub const CREATE_VOLUME: &str = "CreateVolume";
    pub const DELETE_VOLUME: &str = "DeleteVolume";
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterClientRef = Arc<dyn ClusterClient>;
pub type EventRecorderRef = Arc<dyn EventRecorder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_display() {
        assert_eq!(format!("{}", EventKind::Normal), "Normal");
        assert_eq!(format!("{}", EventKind::Warning), "Warning");
    }

    #[test]
    fn test_audit_event_constructors() {
        let ev = AuditEvent::warning(reasons::CREATE_PV_FAILED, actions::CREATE_VOLUME, "boom");
        assert_eq!(ev.kind, EventKind::Warning);
        assert_eq!(ev.reason, "CreatePVFailed");
        assert_eq!(ev.note, "boom");
    }
}
