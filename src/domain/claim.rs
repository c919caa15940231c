//! Domain view of a PersistentVolumeClaim
//!
//! `StaticClaim` is built by explicit conversion from the cluster object so
//! the annotation contract is read in one place.

use crate::domain::annotations;
use crate::domain::types::ClaimPhase;
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolumeClaim};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;

/// The parts of a claim the provisioner reads
#[derive(Debug, Clone, PartialEq)]
pub struct StaticClaim {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
    pub annotations: BTreeMap<String, String>,
    /// `None` when the claim does not name a class at all
    pub storage_class: Option<String>,
    /// `None` until a volume name has been assigned
    pub volume_name: Option<String>,
    pub phase: ClaimPhase,
    pub deleting: bool,
    pub requests: Option<BTreeMap<String, Quantity>>,
    pub access_modes: Option<Vec<String>>,
    pub volume_mode: Option<String>,
    reference: ObjectReference,
}

impl StaticClaim {
    /// Marker annotation present and true
    pub fn is_static_provision(&self) -> bool {
        annotations::has_static_provision_marker(&self.annotations)
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    pub fn phase(&self) -> ClaimPhase {
        self.phase
    }

    /// Only claims that explicitly request the empty class are ours
    pub fn requests_empty_storage_class(&self) -> bool {
        matches!(self.storage_class.as_deref(), Some(""))
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.storage_class.as_deref()
    }

    pub fn volume_name(&self) -> Option<&str> {
        self.volume_name.as_deref()
    }

    /// Reference used as the target of audit events
    pub fn object_ref(&self) -> &ObjectReference {
        &self.reference
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

impl From<&PersistentVolumeClaim> for StaticClaim {
    fn from(pvc: &PersistentVolumeClaim) -> Self {
        let spec = pvc.spec.clone().unwrap_or_default();
        let phase = pvc
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .and_then(|p| p.parse().ok())
            .unwrap_or_default();

        Self {
            namespace: pvc.namespace().unwrap_or_default(),
            name: pvc.name_any(),
            uid: pvc.uid(),
            annotations: pvc.annotations().clone(),
            storage_class: spec.storage_class_name,
            volume_name: spec.volume_name.filter(|n| !n.is_empty()),
            phase,
            deleting: pvc.meta().deletion_timestamp.is_some(),
            requests: spec.resources.and_then(|r| r.requests),
            access_modes: spec.access_modes,
            volume_mode: spec.volume_mode,
            reference: pvc.object_ref(&()),
        }
    }
}

impl fmt::Display for StaticClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, PersistentVolumeClaimStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn pvc(storage_class: Option<&str>, volume_name: Option<&str>) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("data".into()),
                namespace: Some("ns".into()),
                uid: Some("uid-1".into()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                storage_class_name: storage_class.map(String::from),
                volume_name: volume_name.map(String::from),
                ..Default::default()
            }),
            status: None,
        }
    }

    #[test]
    fn test_conversion_defaults() {
        let claim = StaticClaim::from(&pvc(Some(""), None));
        assert_eq!(claim.to_string(), "ns/data");
        assert_eq!(claim.uid.as_deref(), Some("uid-1"));
        assert_eq!(claim.phase(), ClaimPhase::Pending);
        assert!(claim.requests_empty_storage_class());
        assert!(!claim.is_deleting());
        assert!(!claim.is_static_provision());
        assert_eq!(claim.object_ref().name.as_deref(), Some("data"));
        assert_eq!(claim.object_ref().kind.as_deref(), Some("PersistentVolumeClaim"));
    }

    #[test]
    fn test_storage_class_gate() {
        assert!(!StaticClaim::from(&pvc(None, None)).requests_empty_storage_class());
        assert!(!StaticClaim::from(&pvc(Some("nfs"), None)).requests_empty_storage_class());
    }

    #[test]
    fn test_empty_volume_name_is_unset() {
        assert_eq!(StaticClaim::from(&pvc(Some(""), Some(""))).volume_name(), None);
        assert_eq!(
            StaticClaim::from(&pvc(Some(""), Some("pvc-1"))).volume_name(),
            Some("pvc-1")
        );
    }

    #[test]
    fn test_phase_and_deletion() {
        let mut object = pvc(Some(""), None);
        object.status = Some(PersistentVolumeClaimStatus {
            phase: Some("Bound".into()),
            ..Default::default()
        });
        object.metadata.deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));

        let claim = StaticClaim::from(&object);
        assert_eq!(claim.phase(), ClaimPhase::Bound);
        assert!(claim.is_deleting());
    }
}
