//! In-memory cluster adapters
//!
//! An in-process [`ClusterClient`] and [`EventRecorder`] that keep objects
//! in `BTreeMap`s and log every mutation. Failures can be injected per
//! operation to exercise error paths.

use crate::cluster::{CLAIM_KIND, VOLUME_KIND};
use crate::domain::ports::{AuditEvent, ClusterClient, EventRecorder};
use crate::error::{ApiOperation, Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolume, PersistentVolumeClaim};
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// A persisted change, in the order it was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ClaimUpdated {
        namespace: String,
        name: String,
        volume_name: Option<String>,
    },
    VolumeCreated {
        name: String,
    },
    VolumeDeleted {
        name: String,
    },
}

type ClaimKey = (String, String);

/// In-process stand-in for the cluster API
#[derive(Default)]
pub struct InMemoryCluster {
    claims: RwLock<BTreeMap<ClaimKey, PersistentVolumeClaim>>,
    volumes: RwLock<BTreeMap<String, PersistentVolume>>,
    mutations: RwLock<Vec<Mutation>>,
    failures: RwLock<HashSet<(ApiOperation, &'static str)>>,
    resource_version: AtomicU64,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Seed or overwrite a claim without logging a mutation
    pub async fn insert_claim(&self, mut claim: PersistentVolumeClaim) {
        claim.metadata.resource_version = Some(self.next_version());
        let key = (claim.namespace().unwrap_or_default(), claim.name_any());
        self.claims.write().await.insert(key, claim);
    }

    /// Seed or overwrite a volume without logging a mutation
    pub async fn insert_volume(&self, mut volume: PersistentVolume) {
        volume.metadata.resource_version = Some(self.next_version());
        self.volumes.write().await.insert(volume.name_any(), volume);
    }

    /// Remove a volume out-of-band
    pub async fn remove_volume(&self, name: &str) -> Option<PersistentVolume> {
        self.volumes.write().await.remove(name)
    }

    pub async fn claim(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.claims
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn volume(&self, name: &str) -> Option<PersistentVolume> {
        self.volumes.read().await.get(name).cloned()
    }

    pub async fn volume_names(&self) -> Vec<String> {
        self.volumes.read().await.keys().cloned().collect()
    }

    pub async fn mutations(&self) -> Vec<Mutation> {
        self.mutations.read().await.clone()
    }

    /// Make every subsequent `operation` on `kind` fail
    pub async fn fail(&self, operation: ApiOperation, kind: &'static str) {
        self.failures.write().await.insert((operation, kind));
    }

    /// Clear all injected failures
    pub async fn heal(&self) {
        self.failures.write().await.clear();
    }

    async fn check_failure(&self, operation: ApiOperation, kind: &'static str, name: &str) -> Result<()> {
        if self.failures.read().await.contains(&(operation, kind)) {
            debug!(%operation, kind, name, "injected failure");
            return Err(Error::api(operation, kind, name, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        self.check_failure(ApiOperation::Get, CLAIM_KIND, name).await?;
        Ok(self.claim(namespace, name).await)
    }

    async fn update_claim(&self, claim: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim> {
        let namespace = claim.namespace().unwrap_or_default();
        let name = claim.name_any();
        self.check_failure(ApiOperation::Update, CLAIM_KIND, &name).await?;

        let mut claims = self.claims.write().await;
        let key = (namespace.clone(), name.clone());
        let current = claims
            .get(&key)
            .ok_or_else(|| Error::api(ApiOperation::Update, CLAIM_KIND, &name, "not found"))?;

        if claim.metadata.resource_version.is_some()
            && claim.metadata.resource_version != current.metadata.resource_version
        {
            return Err(Error::api(
                ApiOperation::Update,
                CLAIM_KIND,
                &name,
                "the object has been modified",
            ));
        }

        let mut stored = claim.clone();
        stored.metadata.resource_version = Some(self.next_version());
        claims.insert(key, stored.clone());
        drop(claims);

        self.mutations.write().await.push(Mutation::ClaimUpdated {
            namespace,
            name,
            volume_name: stored.spec.as_ref().and_then(|s| s.volume_name.clone()),
        });
        Ok(stored)
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        self.check_failure(ApiOperation::Get, VOLUME_KIND, name).await?;
        Ok(self.volume(name).await)
    }

    async fn create_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let name = volume.name_any();
        self.check_failure(ApiOperation::Create, VOLUME_KIND, &name).await?;

        let mut volumes = self.volumes.write().await;
        if volumes.contains_key(&name) {
            return Err(Error::api(ApiOperation::Create, VOLUME_KIND, &name, "already exists"));
        }

        let mut stored = volume.clone();
        stored.metadata.resource_version = Some(self.next_version());
        volumes.insert(name.clone(), stored.clone());
        drop(volumes);

        self.mutations.write().await.push(Mutation::VolumeCreated { name });
        Ok(stored)
    }

    async fn delete_volume(&self, name: &str) -> Result<()> {
        self.check_failure(ApiOperation::Delete, VOLUME_KIND, name).await?;

        if self.volumes.write().await.remove(name).is_some() {
            self.mutations.write().await.push(Mutation::VolumeDeleted {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Event Recorder
// =============================================================================

/// Recorder that keeps every event in memory
#[derive(Default)]
pub struct MemoryEventRecorder {
    events: RwLock<Vec<(ObjectReference, AuditEvent)>>,
}

impl MemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<(ObjectReference, AuditEvent)> {
        self.events.read().await.clone()
    }

    /// Reasons in emission order
    pub async fn reasons(&self) -> Vec<&'static str> {
        self.events.read().await.iter().map(|(_, e)| e.reason).collect()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(&self, regarding: &ObjectReference, event: AuditEvent) {
        self.events.write().await.push((regarding.clone(), event));
    }
}
