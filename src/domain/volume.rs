//! Domain view of a PersistentVolume
//!
//! - [`VolumeDescriptor`]: a fully formed NFS volume produced from a claim
//! - [`StaticVolume`]: the parts of an observed volume the cleanup rule reads

use crate::domain::annotations;
use crate::domain::types::{ReclaimPolicy, VolumePhase};
use k8s_openapi::api::core::v1::{
    NFSVolumeSource, ObjectReference, PersistentVolume, PersistentVolumeSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

// =============================================================================
// Volume Descriptor
// =============================================================================

/// NFS export coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfsSource {
    pub server: String,
    pub path: String,
    pub read_only: bool,
}

/// Back-reference to the claim a volume was built for.
///
/// Traceability only; it never drives the volume's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReference {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
}

/// A volume ready to be created in the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDescriptor {
    pub name: String,
    pub capacity: Option<BTreeMap<String, Quantity>>,
    pub access_modes: Option<Vec<String>>,
    pub volume_mode: Option<String>,
    pub reclaim_policy: ReclaimPolicy,
    pub mount_options: Vec<String>,
    pub claim_ref: ClaimReference,
    pub storage_class_name: String,
    pub source: NfsSource,
}

impl VolumeDescriptor {
    /// Descriptors are only ever produced for volumes we own
    pub fn is_static_provision(&self) -> bool {
        true
    }

    /// Render the cluster object
    pub fn to_persistent_volume(&self) -> PersistentVolume {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            annotations::STATIC_PROVISION.to_string(),
            "true".to_string(),
        );

        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                capacity: self.capacity.clone(),
                access_modes: self.access_modes.clone(),
                persistent_volume_reclaim_policy: Some(self.reclaim_policy.to_string()),
                mount_options: if self.mount_options.is_empty() {
                    None
                } else {
                    Some(self.mount_options.clone())
                },
                claim_ref: Some(ObjectReference {
                    kind: Some("PersistentVolumeClaim".to_string()),
                    api_version: Some("v1".to_string()),
                    namespace: Some(self.claim_ref.namespace.clone()),
                    name: Some(self.claim_ref.name.clone()),
                    uid: self.claim_ref.uid.clone(),
                    ..Default::default()
                }),
                storage_class_name: Some(self.storage_class_name.clone()),
                volume_mode: self.volume_mode.clone(),
                nfs: Some(NFSVolumeSource {
                    server: self.source.server.clone(),
                    path: self.source.path.clone(),
                    read_only: Some(self.source.read_only),
                }),
                ..Default::default()
            }),
            status: None,
        }
    }
}

// =============================================================================
// Observed Volume
// =============================================================================

/// The parts of an observed volume the provisioner reads
#[derive(Debug, Clone, PartialEq)]
pub struct StaticVolume {
    pub name: String,
    pub static_provision: bool,
    /// `None` when unset or not a recognized policy
    pub reclaim_policy: Option<ReclaimPolicy>,
    /// `None` until status is populated
    pub phase: Option<VolumePhase>,
    pub deleting: bool,
    reference: ObjectReference,
}

impl StaticVolume {
    pub fn is_static_provision(&self) -> bool {
        self.static_provision
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    /// Owned, reclaimed by deletion, and no longer able to serve its claim
    pub fn needs_delete(&self) -> bool {
        self.static_provision
            && self.reclaim_policy == Some(ReclaimPolicy::Delete)
            && self.phase.map(|p| p.is_terminal()).unwrap_or(false)
    }

    pub fn object_ref(&self) -> &ObjectReference {
        &self.reference
    }
}

impl From<&PersistentVolume> for StaticVolume {
    fn from(pv: &PersistentVolume) -> Self {
        Self {
            name: pv.name_any(),
            static_provision: annotations::has_static_provision_marker(pv.annotations()),
            reclaim_policy: pv
                .spec
                .as_ref()
                .and_then(|s| s.persistent_volume_reclaim_policy.as_deref())
                .and_then(|p| p.parse().ok()),
            phase: pv
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .and_then(|p| p.parse().ok()),
            deleting: pv.meta().deletion_timestamp.is_some(),
            reference: pv.object_ref(&()),
        }
    }
}
