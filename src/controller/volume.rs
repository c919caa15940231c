//! Volume Reconciler
//!
//! The cleanup half of the lifecycle. A volume is deleted exactly when it
//! carries the static provisioning marker, its reclaim policy is `Delete`
//! and its phase is `Released` or `Failed`. Only the cluster object is
//! removed; the data on the NFS export is left untouched.

use crate::domain::ports::{actions, reasons, AuditEvent, ClusterClientRef, EventRecorderRef};
use crate::domain::volume::StaticVolume;
use crate::error::Result;
use k8s_openapi::api::core::v1::PersistentVolume;
use tracing::{debug, error, info, instrument};

/// Why a pass left the volume alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeSkip {
    NotFound,
    Deleting,
    NotReclaimable,
}

/// Result of one volume reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeOutcome {
    Skipped(VolumeSkip),
    Deleted(String),
}

/// Deletes released static volumes whose policy asks for it
pub struct VolumeReconciler {
    cluster: ClusterClientRef,
    recorder: EventRecorderRef,
}

impl VolumeReconciler {
    pub fn new(cluster: ClusterClientRef, recorder: EventRecorderRef) -> Self {
        Self { cluster, recorder }
    }

    /// Read the volume fresh and reconcile it
    #[instrument(skip(self))]
    pub async fn reconcile(&self, name: &str) -> Result<VolumeOutcome> {
        match self.cluster.get_volume(name).await? {
            Some(pv) => self.reconcile_volume(&pv).await,
            None => Ok(VolumeOutcome::Skipped(VolumeSkip::NotFound)),
        }
    }

    pub async fn reconcile_volume(&self, pv: &PersistentVolume) -> Result<VolumeOutcome> {
        let volume = StaticVolume::from(pv);

        if volume.is_deleting() {
            debug!(volume = %volume.name, "volume is being deleted");
            return Ok(VolumeOutcome::Skipped(VolumeSkip::Deleting));
        }

        if !volume.needs_delete() {
            return Ok(VolumeOutcome::Skipped(VolumeSkip::NotReclaimable));
        }

        match self.cluster.delete_volume(&volume.name).await {
            Ok(()) => {
                info!(volume = %volume.name, phase = ?volume.phase, "deleted static volume");
                self.recorder
                    .record(
                        volume.object_ref(),
                        AuditEvent::normal(
                            reasons::PV_DELETED,
                            actions::DELETE_VOLUME,
                            format!("pv {} deleted", volume.name),
                        ),
                    )
                    .await;
                Ok(VolumeOutcome::Deleted(volume.name.clone()))
            }
            Err(e) => {
                error!(volume = %volume.name, error = %e, "failed to delete volume");
                self.recorder
                    .record(
                        volume.object_ref(),
                        AuditEvent::warning(
                            reasons::DELETE_PV_FAILED,
                            actions::DELETE_VOLUME,
                            format!("failed to delete pv, error: {}", e),
                        ),
                    )
                    .await;
                Err(e)
            }
        }
    }
}
