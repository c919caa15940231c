//! Claim Reconciler
//!
//! Evaluated once per observed claim, short-circuiting at the first rule
//! that matches:
//!
//! 1. claim is being deleted → no-op
//! 2. claim is Bound → no-op
//! 3. claim names a storage class → no-op
//! 4. claim lacks the static provisioning marker → no-op
//! 5. build the volume descriptor, then either assign the volume name to
//!    the claim or, if one is already assigned, create the volume when it
//!    does not exist yet
//!
//! A pass performs at most one persisted mutation and never a destructive one.

use crate::domain::builder::build_volume;
use crate::domain::claim::StaticClaim;
use crate::domain::ports::{
    actions, reasons, AuditEvent, ClusterClientRef, EventRecorderRef,
};
use crate::domain::types::ClaimPhase;
use crate::domain::volume::VolumeDescriptor;
use crate::error::Result;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Why a pass left the claim alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimSkip {
    NotFound,
    Deleting,
    AlreadyBound,
    StorageClassOwned,
    NotStaticProvision,
}

impl fmt::Display for ClaimSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimSkip::NotFound => write!(f, "claim not found"),
            ClaimSkip::Deleting => write!(f, "claim is being deleted"),
            ClaimSkip::AlreadyBound => write!(f, "claim is already bound"),
            ClaimSkip::StorageClassOwned => write!(f, "claim does not request the empty storage class"),
            ClaimSkip::NotStaticProvision => write!(f, "claim is not marked for static provisioning"),
        }
    }
}

/// Result of one claim reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Skipped(ClaimSkip),
    /// The claim was updated to reference this volume name
    VolumeNameAssigned(String),
    /// The referenced volume was missing and has been created
    VolumeCreated(String),
    /// The referenced volume already exists
    VolumeExists(String),
}

/// Decide whether a claim is ours to act on
pub fn precheck(claim: &StaticClaim) -> Option<ClaimSkip> {
    if claim.is_deleting() {
        return Some(ClaimSkip::Deleting);
    }
    if claim.phase() == ClaimPhase::Bound {
        return Some(ClaimSkip::AlreadyBound);
    }
    if !claim.requests_empty_storage_class() {
        return Some(ClaimSkip::StorageClassOwned);
    }
    if !claim.is_static_provision() {
        return Some(ClaimSkip::NotStaticProvision);
    }
    None
}

/// Drives claims toward having a static NFS volume
pub struct ClaimReconciler {
    cluster: ClusterClientRef,
    recorder: EventRecorderRef,
}

impl ClaimReconciler {
    pub fn new(cluster: ClusterClientRef, recorder: EventRecorderRef) -> Self {
        Self { cluster, recorder }
    }

    /// Read the claim fresh and reconcile it
    #[instrument(skip(self), fields(claim = %format!("{}/{}", namespace, name)))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ClaimOutcome> {
        match self.cluster.get_claim(namespace, name).await? {
            Some(pvc) => self.reconcile_claim(pvc).await,
            None => {
                debug!("claim not found");
                Ok(ClaimOutcome::Skipped(ClaimSkip::NotFound))
            }
        }
    }

    /// Reconcile an already fetched claim
    pub async fn reconcile_claim(&self, pvc: PersistentVolumeClaim) -> Result<ClaimOutcome> {
        let claim = StaticClaim::from(&pvc);

        if let Some(skip) = precheck(&claim) {
            debug!(claim = %claim, reason = %skip, "skipping claim");
            return Ok(ClaimOutcome::Skipped(skip));
        }

        let descriptor = match build_volume(&claim) {
            Ok(descriptor) => {
                self.recorder
                    .record(
                        claim.object_ref(),
                        AuditEvent::normal(
                            reasons::PV_PARSED,
                            actions::PARSE,
                            "parsed pv from pvc successfully",
                        ),
                    )
                    .await;
                descriptor
            }
            Err(e) => {
                warn!(claim = %claim, error = %e, "invalid static provisioning annotations");
                self.recorder
                    .record(
                        claim.object_ref(),
                        AuditEvent::warning(
                            reasons::PARSE_PV_FAILED,
                            actions::PARSE,
                            format!("failed to parse pv from pvc, error: {}", e),
                        ),
                    )
                    .await;
                return Err(e.into());
            }
        };

        match claim.volume_name() {
            None => self.assign_volume_name(pvc, &claim, &descriptor).await,
            Some(existing) => self.ensure_volume(&claim, existing, &descriptor).await,
        }
    }

    async fn assign_volume_name(
        &self,
        mut pvc: PersistentVolumeClaim,
        claim: &StaticClaim,
        descriptor: &VolumeDescriptor,
    ) -> Result<ClaimOutcome> {
        pvc.spec.get_or_insert_with(Default::default).volume_name = Some(descriptor.name.clone());

        match self.cluster.update_claim(&pvc).await {
            Ok(_) => {
                info!(claim = %claim, volume = %descriptor.name, "assigned volume name");
                self.recorder
                    .record(
                        claim.object_ref(),
                        AuditEvent::normal(
                            reasons::VOLUME_NAME_UPDATED,
                            actions::UPDATE_CLAIM,
                            "volumeName updated successfully",
                        ),
                    )
                    .await;
                Ok(ClaimOutcome::VolumeNameAssigned(descriptor.name.clone()))
            }
            Err(e) => {
                warn!(claim = %claim, error = %e, "failed to assign volume name");
                self.recorder
                    .record(
                        claim.object_ref(),
                        AuditEvent::warning(
                            reasons::UPDATE_VOLUME_NAME_FAILED,
                            actions::UPDATE_CLAIM,
                            format!("failed to update volumeName, error: {}", e),
                        ),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn ensure_volume(
        &self,
        claim: &StaticClaim,
        volume_name: &str,
        descriptor: &VolumeDescriptor,
    ) -> Result<ClaimOutcome> {
        // An existing volume is left as is, even if the annotations changed
        // since it was created.
        if self.cluster.get_volume(volume_name).await?.is_some() {
            debug!(claim = %claim, volume = %volume_name, "volume already exists");
            return Ok(ClaimOutcome::VolumeExists(volume_name.to_string()));
        }

        match self.cluster.create_volume(&descriptor.to_persistent_volume()).await {
            Ok(_) => {
                info!(claim = %claim, volume = %descriptor.name, "created volume");
                self.recorder
                    .record(
                        claim.object_ref(),
                        AuditEvent::normal(
                            reasons::PV_CREATED,
                            actions::CREATE_VOLUME,
                            format!("pv {} created successfully", descriptor.name),
                        ),
                    )
                    .await;
                Ok(ClaimOutcome::VolumeCreated(descriptor.name.clone()))
            }
            Err(e) => {
                warn!(claim = %claim, volume = %descriptor.name, error = %e, "failed to create volume");
                self.recorder
                    .record(
                        claim.object_ref(),
                        AuditEvent::warning(
                            reasons::CREATE_PV_FAILED,
                            actions::CREATE_VOLUME,
                            format!("failed to create pv {}, error: {}", descriptor.name, e),
                        ),
                    )
                    .await;
                Err(e)
            }
        }
    }
}
