//! Controller runner
//!
//! Wires the reconcilers into `kube::runtime::Controller`. Each watch is
//! routed through a [`ChangeClassifier`] so only the change kinds allowed by
//! the configured [`EventFilter`] schedule a reconciliation. Failed passes are
//! requeued with per-object exponential backoff.
//!
//! Readiness flips once every watch has delivered its initial list and
//! stays set afterwards; a watch that drops is retried by the watcher's
//! own backoff.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{reflector, watcher, Controller, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use super::backoff::{BackoffConfig, RequeueBackoff};
use super::claim::{ClaimOutcome, ClaimReconciler};
use super::filter::{ChangeClassifier, EventFilter};
use super::volume::{VolumeOutcome, VolumeReconciler};
use crate::config::OperatorConfig;
use crate::domain::ports::{ClusterClientRef, EventRecorderRef};
use crate::error::{Error, ErrorAction, Result};
use crate::metrics::{ControllerMetrics, CLAIM_CONTROLLER, VOLUME_CONTROLLER};

/// A controller ready to be polled
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Number of watches started by [`build_controllers`]
pub const WATCH_COUNT: usize = 2;

/// Ready once every watch has completed its initial list
#[derive(Debug)]
pub struct Readiness {
    pending: AtomicUsize,
}

impl Readiness {
    pub fn new(watches: usize) -> Self {
        Self {
            pending: AtomicUsize::new(watches),
        }
    }

    fn mark_synced(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn is_ready(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }
}

/// Shared state handed to every reconciliation
pub struct Context {
    pub claims: ClaimReconciler,
    pub volumes: VolumeReconciler,
    pub claim_backoff: RequeueBackoff,
    pub volume_backoff: RequeueBackoff,
    pub metrics: ControllerMetrics,
}

impl Context {
    pub fn new(
        cluster: ClusterClientRef,
        recorder: EventRecorderRef,
        backoff: BackoffConfig,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            claims: ClaimReconciler::new(cluster.clone(), recorder.clone()),
            volumes: VolumeReconciler::new(cluster, recorder),
            claim_backoff: RequeueBackoff::new(backoff),
            volume_backoff: RequeueBackoff::new(backoff),
            metrics,
        }
    }

    /// Drop requeue state for a claim that no longer exists
    pub fn forget_claim(&self, namespace: Option<&str>, name: &str) {
        self.claim_backoff
            .reset(&format!("{}/{}", namespace.unwrap_or_default(), name));
    }

    /// Drop requeue state for a volume that no longer exists
    pub fn forget_volume(&self, name: &str) {
        self.volume_backoff.reset(name);
    }
}

fn claim_key(pvc: &PersistentVolumeClaim) -> String {
    format!("{}/{}", pvc.namespace().unwrap_or_default(), pvc.name_any())
}

/// Reconcile the claim a watch event pointed at
pub async fn reconcile_claim(pvc: Arc<PersistentVolumeClaim>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = pvc.namespace().unwrap_or_default();
    let name = pvc.name_any();
    let timer = ctx
        .metrics
        .duration
        .with_label_values(&[CLAIM_CONTROLLER])
        .start_timer();

    let result = ctx.claims.reconcile(&namespace, &name).await;
    timer.observe_duration();

    match result {
        Ok(outcome) => {
            ctx.metrics.record(CLAIM_CONTROLLER, "success");
            match &outcome {
                ClaimOutcome::VolumeNameAssigned(_) => ctx.metrics.claims_assigned.inc(),
                ClaimOutcome::VolumeCreated(_) => ctx.metrics.volumes_created.inc(),
                _ => {}
            }
            ctx.claim_backoff.reset(&claim_key(&pvc));
            debug!(namespace = %namespace, name = %name, ?outcome, "claim reconciled");
            Ok(Action::await_change())
        }
        Err(e) => {
            ctx.metrics.record(CLAIM_CONTROLLER, e.kind());
            Err(e)
        }
    }
}

/// Requeue policy for failed claim passes
pub fn claim_error_policy(pvc: Arc<PersistentVolumeClaim>, error: &Error, ctx: Arc<Context>) -> Action {
    requeue_action(error, &ctx.claim_backoff, &claim_key(&pvc))
}

/// Reconcile the volume a watch event pointed at
pub async fn reconcile_volume(pv: Arc<PersistentVolume>, ctx: Arc<Context>) -> Result<Action> {
    let name = pv.name_any();
    let timer = ctx
        .metrics
        .duration
        .with_label_values(&[VOLUME_CONTROLLER])
        .start_timer();

    let result = ctx.volumes.reconcile(&name).await;
    timer.observe_duration();

    match result {
        Ok(outcome) => {
            ctx.metrics.record(VOLUME_CONTROLLER, "success");
            if let VolumeOutcome::Deleted(_) = outcome {
                ctx.metrics.volumes_deleted.inc();
            }
            ctx.volume_backoff.reset(&name);
            debug!(volume = %name, ?outcome, "volume reconciled");
            Ok(Action::await_change())
        }
        Err(e) => {
            ctx.metrics.record(VOLUME_CONTROLLER, e.kind());
            Err(e)
        }
    }
}

/// Requeue policy for failed volume passes
pub fn volume_error_policy(pv: Arc<PersistentVolume>, error: &Error, ctx: Arc<Context>) -> Action {
    requeue_action(error, &ctx.volume_backoff, &pv.name_any())
}

fn requeue_action(error: &Error, backoff: &RequeueBackoff, key: &str) -> Action {
    match error.action() {
        ErrorAction::RequeueWithBackoff => {
            let delay = backoff.next_delay(key);
            debug!(object = %key, error = %error, ?delay, "requeueing after failure");
            Action::requeue(delay)
        }
        ErrorAction::RequeueAfter(delay) => Action::requeue(delay),
        ErrorAction::NoRequeue => {
            error!(object = %key, error = %error, "not requeueing");
            backoff.reset(key);
            Action::await_change()
        }
    }
}

/// Build the claim and volume controller futures
pub fn build_controllers(
    client: Client,
    config: &OperatorConfig,
    ctx: Arc<Context>,
    readiness: Arc<Readiness>,
) -> Vec<ControllerFuture> {
    let claims: Api<PersistentVolumeClaim> = match &config.watch_namespace {
        Some(namespace) => {
            info!(namespace = %namespace, "watching claims in a single namespace");
            Api::namespaced(client.clone(), namespace)
        }
        None => Api::all(client.clone()),
    };
    let volumes: Api<PersistentVolume> = Api::all(client);
    let watch = WatcherConfig::default().timeout(config.watch_timeout_secs);

    info!("- PersistentVolumeClaim controller");
    info!("- PersistentVolume controller");

    let claim_ctx = ctx.clone();
    let volume_ctx = ctx.clone();

    vec![
        Box::pin(
            filtered_controller(
                claims,
                watch.clone(),
                WatchGate::new(config.claim_filter, readiness.clone()),
                move |namespace, name| claim_ctx.forget_claim(namespace, name),
            )
            .run(reconcile_claim, claim_error_policy, ctx.clone())
            .for_each(log_reconcile_result("PersistentVolumeClaim")),
        ),
        Box::pin(
            filtered_controller(
                volumes,
                watch,
                WatchGate::new(config.volume_filter, readiness),
                move |_, name| volume_ctx.forget_volume(name),
            )
            .run(reconcile_volume, volume_error_policy, ctx)
            .for_each(log_reconcile_result("PersistentVolume")),
        ),
    ]
}

/// Per-watch state between the reflector and the controller
struct WatchGate {
    classifier: ChangeClassifier,
    readiness: Arc<Readiness>,
    synced: bool,
}

impl WatchGate {
    fn new(filter: EventFilter, readiness: Arc<Readiness>) -> Self {
        Self {
            classifier: ChangeClassifier::new(filter),
            readiness,
            synced: false,
        }
    }

    /// Objects to reconcile for `event`; vanished objects go to `on_gone`
    fn admit<K: Resource>(
        &mut self,
        event: watcher::Event<K>,
        on_gone: impl FnMut(Option<&str>, &str),
    ) -> Vec<K> {
        if !self.synced && matches!(event, watcher::Event::Restarted(_)) {
            self.synced = true;
            self.readiness.mark_synced();
        }
        self.classifier.triggers_with(event, on_gone)
    }
}

/// Controller fed only by the changes the gate's filter allows
fn filtered_controller<K, F>(
    api: Api<K>,
    watch: WatcherConfig,
    mut gate: WatchGate,
    mut on_gone: F,
) -> Controller<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    F: FnMut(Option<&str>, &str) + Send + 'static,
{
    let (reader, writer) = reflector::store();

    let triggers = reflector(writer, watcher(api, watch).default_backoff())
        .map_ok(move |event| {
            stream::iter(
                gate.admit(event, &mut on_gone)
                    .into_iter()
                    .map(Ok::<K, watcher::Error>),
            )
        })
        .try_flatten();

    Controller::for_stream(triggers, reader).shutdown_on_signal()
}

fn log_reconcile_result<T: Debug, E: Debug>(
    controller_name: &'static str,
) -> impl Fn(std::result::Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
