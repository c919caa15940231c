//! Controller Metrics
//!
//! Prometheus collectors for reconciliation activity, registered into a
//! caller-supplied registry and exposed by the metrics server.

use crate::error::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

/// Label value for the claim controller
pub const CLAIM_CONTROLLER: &str = "claim";

/// Label value for the volume controller
pub const VOLUME_CONTROLLER: &str = "volume";

/// Collectors shared by both controllers
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Reconciliations by controller and result
    pub reconciliations: IntCounterVec,
    /// Reconciliation duration by controller
    pub duration: HistogramVec,
    /// Claims that had a volume name assigned
    pub claims_assigned: IntCounter,
    /// Volumes created
    pub volumes_created: IntCounter,
    /// Volumes deleted
    pub volumes_deleted: IntCounter,
}

impl ControllerMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let reconciliations = IntCounterVec::new(
            Opts::new(
                "nfs_static_provisioner_reconciliations_total",
                "Reconciliation passes by controller and result",
            ),
            &["controller", "result"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "nfs_static_provisioner_reconcile_duration_seconds",
                "Duration of reconciliation passes",
            ),
            &["controller"],
        )?;
        let claims_assigned = IntCounter::new(
            "nfs_static_provisioner_claims_assigned_total",
            "Claims that had a volume name assigned",
        )?;
        let volumes_created = IntCounter::new(
            "nfs_static_provisioner_volumes_created_total",
            "Static volumes created",
        )?;
        let volumes_deleted = IntCounter::new(
            "nfs_static_provisioner_volumes_deleted_total",
            "Static volumes deleted",
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(claims_assigned.clone()))?;
        registry.register(Box::new(volumes_created.clone()))?;
        registry.register(Box::new(volumes_deleted.clone()))?;

        Ok(Self {
            reconciliations,
            duration,
            claims_assigned,
            volumes_created,
            volumes_deleted,
        })
    }

    /// Count one pass; `result` is "success" or an error kind
    pub fn record(&self, controller: &str, result: &str) {
        self.reconciliations
            .with_label_values(&[controller, result])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = Registry::new();
        let metrics = ControllerMetrics::new(&registry).unwrap();

        metrics.record(CLAIM_CONTROLLER, "success");
        metrics.record(CLAIM_CONTROLLER, "success");
        metrics.record(VOLUME_CONTROLLER, "api");
        metrics.volumes_created.inc();

        assert_eq!(
            metrics
                .reconciliations
                .with_label_values(&[CLAIM_CONTROLLER, "success"])
                .get(),
            2
        );
        assert_eq!(metrics.volumes_created.get(), 1);
        assert!(registry
            .gather()
            .iter()
            .any(|f| f.get_name() == "nfs_static_provisioner_reconciliations_total"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        ControllerMetrics::new(&registry).unwrap();
        assert!(ControllerMetrics::new(&registry).is_err());
    }
}
