//! Kubernetes Event recording
//!
//! Publishes [`AuditEvent`]s as standard Kubernetes Events visible via
//! `kubectl describe`. Failures are logged as warnings and never propagate.

use crate::domain::ports::{AuditEvent, EventKind, EventRecorder};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Production recorder wrapping `kube::runtime::events::Recorder`
pub struct KubeEventRecorder {
    client: Client,
    reporter: Reporter,
}

impl KubeEventRecorder {
    /// The controller name appears as the reporting component on Events
    pub fn new(client: Client, controller_name: &str) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: controller_name.to_string(),
                instance: std::env::var("POD_NAME").ok(),
            },
        }
    }
}

fn event_type(kind: EventKind) -> EventType {
    match kind {
        EventKind::Normal => EventType::Normal,
        EventKind::Warning => EventType::Warning,
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, regarding: &ObjectReference, event: AuditEvent) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), regarding.clone());
        let published = recorder
            .publish(Event {
                type_: event_type(event.kind),
                reason: event.reason.to_string(),
                note: Some(event.note),
                action: event.action.to_string(),
                secondary: None,
            })
            .await;

        if let Err(e) = published {
            warn!(
                reason = event.reason,
                object = ?regarding.name,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_mapping() {
        assert!(matches!(event_type(EventKind::Normal), EventType::Normal));
        assert!(matches!(event_type(EventKind::Warning), EventType::Warning));
    }
}
