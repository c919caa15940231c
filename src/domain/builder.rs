//! Volume-Descriptor Builder
//!
//! Turns a claim's static provisioning annotations into a
//! [`VolumeDescriptor`]. This is the only place annotation semantics are
//! interpreted; it performs no I/O.
//!
//! | Annotation | Required | Default |
//! |------------|----------|---------|
//! | nfs-server | yes | |
//! | nfs-path | yes | |
//! | mount-options | no | `[]` |
//! | reclaim-policy | no | `Delete` |
//! | nfs-readonly | no | `false` |

use crate::domain::annotations;
use crate::domain::claim::StaticClaim;
use crate::domain::types::ReclaimPolicy;
use crate::domain::volume::{ClaimReference, NfsSource, VolumeDescriptor};
use thiserror::Error;
use tracing::debug;

/// Prefix of every synthesized volume name
pub const VOLUME_NAME_PREFIX: &str = "pvc-";

/// Annotation validation failures. Each carries the offending annotation key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("annotation {0} not found or empty")]
    MissingField(String),

    #[error("annotation {0} has invalid value")]
    MalformedField(String),
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(f) | ValidationError::MalformedField(f) => f,
        }
    }
}

/// Build the volume descriptor for a claim.
///
/// A claim that already names a volume keeps that name, so repeated
/// passes converge on one volume.
pub fn build_volume(claim: &StaticClaim) -> Result<VolumeDescriptor, ValidationError> {
    let server = required(claim, annotations::NFS_SERVER)?;
    let path = required(claim, annotations::NFS_PATH)?;
    let mount_options = mount_options(claim)?;
    let reclaim_policy = reclaim_policy(claim)?;
    let read_only = read_only(claim)?;

    let name = match claim.volume_name() {
        Some(name) => name.to_string(),
        None => synthesize_name(),
    };

    Ok(VolumeDescriptor {
        name,
        capacity: claim.requests.clone(),
        access_modes: claim.access_modes.clone(),
        volume_mode: claim.volume_mode.clone(),
        reclaim_policy,
        mount_options,
        claim_ref: ClaimReference {
            namespace: claim.namespace.clone(),
            name: claim.name.clone(),
            uid: claim.uid.clone(),
        },
        storage_class_name: claim.storage_class().unwrap_or_default().to_string(),
        source: NfsSource {
            server,
            path,
            read_only,
        },
    })
}

/// Fresh, globally unique volume name
pub fn synthesize_name() -> String {
    format!("{}{}", VOLUME_NAME_PREFIX, uuid::Uuid::new_v4())
}

fn required(claim: &StaticClaim, key: &str) -> Result<String, ValidationError> {
    match claim.annotation(key) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::MissingField(key.to_string())),
    }
}

fn mount_options(claim: &StaticClaim) -> Result<Vec<String>, ValidationError> {
    match claim.annotation(annotations::MOUNT_OPTIONS) {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw).map_err(|e| {
            debug!(claim = %claim, error = %e, "mount options are not a JSON string array");
            ValidationError::MalformedField(annotations::MOUNT_OPTIONS.to_string())
        }),
        _ => Ok(Vec::new()),
    }
}

fn reclaim_policy(claim: &StaticClaim) -> Result<ReclaimPolicy, ValidationError> {
    match claim.annotation(annotations::RECLAIM_POLICY) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ValidationError::MalformedField(annotations::RECLAIM_POLICY.to_string())),
        None => Ok(ReclaimPolicy::default()),
    }
}

fn read_only(claim: &StaticClaim) -> Result<bool, ValidationError> {
    match claim.annotation(annotations::NFS_READ_ONLY) {
        Some(raw) if !raw.is_empty() => annotations::parse_bool(raw)
            .ok_or_else(|| ValidationError::MalformedField(annotations::NFS_READ_ONLY.to_string())),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{
        PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn claim(annotations: &[(&str, &str)], volume_name: Option<&str>) -> StaticClaim {
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity("10Gi".into()));

        let pvc = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("data".into()),
                namespace: Some("ns".into()),
                uid: Some("uid-7".into()),
                annotations: Some(
                    annotations
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteMany".into()]),
                storage_class_name: Some(String::new()),
                volume_mode: Some("Filesystem".into()),
                volume_name: volume_name.map(String::from),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        };
        StaticClaim::from(&pvc)
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            (annotations::STATIC_PROVISION, "true"),
            (annotations::NFS_SERVER, "nfs.local"),
            (annotations::NFS_PATH, "/data"),
        ]
    }

    #[test]
    fn test_full_annotation_set() {
        let c = claim(
            &[
                (annotations::STATIC_PROVISION, "true"),
                (annotations::NFS_SERVER, "10.0.0.1"),
                (annotations::NFS_PATH, "/export/a"),
                (annotations::MOUNT_OPTIONS, r#"["ro","vers=4"]"#),
                (annotations::RECLAIM_POLICY, "Retain"),
                (annotations::NFS_READ_ONLY, "true"),
            ],
            None,
        );

        let volume = build_volume(&c).unwrap();
        assert_eq!(
            volume.source,
            NfsSource {
                server: "10.0.0.1".into(),
                path: "/export/a".into(),
                read_only: true,
            }
        );
        assert_eq!(volume.mount_options, vec!["ro", "vers=4"]);
        assert_eq!(volume.reclaim_policy, ReclaimPolicy::Retain);
        assert!(volume.is_static_provision());
    }

    #[test]
    fn test_defaults_and_copied_fields() {
        let volume = build_volume(&claim(&minimal(), None)).unwrap();

        assert!(volume.name.starts_with(VOLUME_NAME_PREFIX));
        assert!(volume.mount_options.is_empty());
        assert_eq!(volume.reclaim_policy, ReclaimPolicy::Delete);
        assert!(!volume.source.read_only);
        assert_eq!(volume.storage_class_name, "");
        assert_eq!(volume.access_modes, Some(vec!["ReadWriteMany".to_string()]));
        assert_eq!(volume.volume_mode.as_deref(), Some("Filesystem"));
        assert_eq!(
            volume.capacity.as_ref().and_then(|c| c.get("storage")),
            Some(&Quantity("10Gi".into()))
        );
        assert_eq!(
            volume.claim_ref,
            ClaimReference {
                namespace: "ns".into(),
                name: "data".into(),
                uid: Some("uid-7".into()),
            }
        );
    }

    #[test]
    fn test_reuses_assigned_volume_name() {
        let c = claim(&minimal(), Some("pvc-fixed"));
        assert_eq!(build_volume(&c).unwrap().name, "pvc-fixed");
        assert_eq!(build_volume(&c).unwrap().name, "pvc-fixed");
    }

    #[test]
    fn test_synthesized_names_are_unique() {
        let c = claim(&minimal(), None);
        assert_ne!(build_volume(&c).unwrap().name, build_volume(&c).unwrap().name);
    }

    #[test]
    fn test_missing_server() {
        let c = claim(
            &[
                (annotations::STATIC_PROVISION, "true"),
                (annotations::NFS_PATH, "/data"),
            ],
            None,
        );
        assert_matches!(
            build_volume(&c),
            Err(ValidationError::MissingField(key)) if key == annotations::NFS_SERVER
        );
    }

    #[test]
    fn test_empty_path_is_missing() {
        let mut a = minimal();
        a[2] = (annotations::NFS_PATH, "");
        assert_matches!(
            build_volume(&claim(&a, None)),
            Err(ValidationError::MissingField(key)) if key == annotations::NFS_PATH
        );
    }

    #[test]
    fn test_malformed_mount_options() {
        for raw in ["not-json", r#"{"a":1}"#, "[1,2]"] {
            let mut a = minimal();
            a.push((annotations::MOUNT_OPTIONS, raw));
            let err = build_volume(&claim(&a, None)).unwrap_err();
            assert_eq!(err, ValidationError::MalformedField(annotations::MOUNT_OPTIONS.into()));
        }
    }

    #[test]
    fn test_empty_mount_options_default() {
        let mut a = minimal();
        a.push((annotations::MOUNT_OPTIONS, ""));
        assert!(build_volume(&claim(&a, None)).unwrap().mount_options.is_empty());
    }

    #[test]
    fn test_invalid_reclaim_policy() {
        for raw in ["delete", "Purge", ""] {
            let mut a = minimal();
            a.push((annotations::RECLAIM_POLICY, raw));
            assert_matches!(
                build_volume(&claim(&a, None)),
                Err(ValidationError::MalformedField(key)) if key == annotations::RECLAIM_POLICY
            );
        }
    }

    #[test]
    fn test_read_only_flag() {
        let mut a = minimal();
        a.push((annotations::NFS_READ_ONLY, "maybe"));
        let err = build_volume(&claim(&a, None)).unwrap_err();
        assert_eq!(err.field(), annotations::NFS_READ_ONLY);

        let mut a = minimal();
        a.push((annotations::NFS_READ_ONLY, ""));
        assert!(!build_volume(&claim(&a, None)).unwrap().source.read_only);

        let mut a = minimal();
        a.push((annotations::NFS_READ_ONLY, "1"));
        assert!(build_volume(&claim(&a, None)).unwrap().source.read_only);
    }

    #[test]
    fn test_server_checked_before_path() {
        let c = claim(&[(annotations::STATIC_PROVISION, "true")], None);
        assert_eq!(
            build_volume(&c).unwrap_err(),
            ValidationError::MissingField(annotations::NFS_SERVER.into())
        );
    }
}
