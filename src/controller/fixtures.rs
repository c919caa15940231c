//! Object builders shared by the controller tests

use crate::cluster::{InMemoryCluster, MemoryEventRecorder};
use crate::domain::annotations;
use k8s_openapi::api::core::v1::{
    NFSVolumeSource, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimStatus, PersistentVolumeSpec, PersistentVolumeStatus,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn harness() -> (Arc<InMemoryCluster>, Arc<MemoryEventRecorder>) {
    (
        Arc::new(InMemoryCluster::new()),
        Arc::new(MemoryEventRecorder::new()),
    )
}

/// Pending claim in the empty storage class with the given annotations
pub fn claim(namespace: &str, name: &str, annotations: &[(&str, &str)]) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity("1Gi".into()));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            uid: Some(format!("uid-{}", name)),
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
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: Some(PersistentVolumeClaimStatus {
            phase: Some("Pending".into()),
            ..Default::default()
        }),
    }
}

/// Claim carrying the marker plus server `nfs.local` and path `/data`
pub fn nfs_claim(namespace: &str, name: &str) -> PersistentVolumeClaim {
    claim(
        namespace,
        name,
        &[
            (annotations::STATIC_PROVISION, "true"),
            (annotations::NFS_SERVER, "nfs.local"),
            (annotations::NFS_PATH, "/data"),
        ],
    )
}

pub fn with_storage_class(mut pvc: PersistentVolumeClaim, class: Option<&str>) -> PersistentVolumeClaim {
    if let Some(spec) = pvc.spec.as_mut() {
        spec.storage_class_name = class.map(String::from);
    }
    pvc
}

pub fn with_volume_name(mut pvc: PersistentVolumeClaim, volume: &str) -> PersistentVolumeClaim {
    if let Some(spec) = pvc.spec.as_mut() {
        spec.volume_name = Some(volume.into());
    }
    pvc
}

pub fn with_claim_phase(mut pvc: PersistentVolumeClaim, phase: &str) -> PersistentVolumeClaim {
    pvc.status = Some(PersistentVolumeClaimStatus {
        phase: Some(phase.into()),
        ..Default::default()
    });
    pvc
}

pub fn deleting<K: kube::Resource>(mut object: K) -> K {
    object.meta_mut().deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));
    object
}

/// NFS volume with the given marker, reclaim policy and phase
pub fn volume(name: &str, marker: bool, policy: &str, phase: &str) -> PersistentVolume {
    let mut annotations = BTreeMap::new();
    if marker {
        annotations.insert(annotations::STATIC_PROVISION.to_string(), "true".to_string());
    }

    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.into()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            persistent_volume_reclaim_policy: Some(policy.into()),
            nfs: Some(NFSVolumeSource {
                server: "nfs.local".into(),
                path: "/data".into(),
                read_only: Some(false),
            }),
            ..Default::default()
        }),
        status: Some(PersistentVolumeStatus {
            phase: Some(phase.into()),
            ..Default::default()
        }),
    }
}
