//! Kubernetes API Adapter
//!
//! Implements [`ClusterClient`] over `kube::Api`. Every call is bounded by
//! the configured request timeout; an expired deadline surfaces as a
//! retryable [`Error::Timeout`].

use crate::cluster::{CLAIM_KIND, VOLUME_KIND};
use crate::domain::ports::ClusterClient;
use crate::error::{ApiOperation, Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Adapter for the live cluster
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    request_timeout: Duration,
}

impl KubeClusterClient {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn volumes(&self) -> Api<PersistentVolume> {
        Api::all(self.client.clone())
    }

    /// Run one API call under the request deadline
    async fn bounded<T, F>(
        &self,
        operation: ApiOperation,
        kind: &'static str,
        name: &str,
        call: F,
    ) -> Result<std::result::Result<T, kube::Error>>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                kind,
                name: name.to_string(),
                after: self.request_timeout,
            })
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_claim(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        let key = format!("{}/{}", namespace, name);
        let api = self.claims(namespace);
        self.bounded(ApiOperation::Get, CLAIM_KIND, &key, api.get_opt(name))
            .await?
            .map_err(|e| Error::api(ApiOperation::Get, CLAIM_KIND, key, e))
    }

    async fn update_claim(&self, claim: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim> {
        let namespace = claim.namespace().unwrap_or_default();
        let name = claim.name_any();
        let key = format!("{}/{}", namespace, name);
        let api = self.claims(&namespace);
        let pp = PostParams::default();
        self.bounded(
            ApiOperation::Update,
            CLAIM_KIND,
            &key,
            api.replace(&name, &pp, claim),
        )
        .await?
        .map_err(|e| Error::api(ApiOperation::Update, CLAIM_KIND, key, e))
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        let api = self.volumes();
        self.bounded(ApiOperation::Get, VOLUME_KIND, name, api.get_opt(name))
            .await?
            .map_err(|e| Error::api(ApiOperation::Get, VOLUME_KIND, name, e))
    }

    async fn create_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let name = volume.name_any();
        let api = self.volumes();
        let pp = PostParams::default();
        self.bounded(ApiOperation::Create, VOLUME_KIND, &name, api.create(&pp, volume))
            .await?
            .map_err(|e| Error::api(ApiOperation::Create, VOLUME_KIND, name, e))
    }

    async fn delete_volume(&self, name: &str) -> Result<()> {
        let api = self.volumes();
        let dp = DeleteParams::default();
        match self
            .bounded(ApiOperation::Delete, VOLUME_KIND, name, api.delete(name, &dp))
            .await?
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!(volume = %name, "volume already gone");
                Ok(())
            }
            Err(e) => Err(Error::api(ApiOperation::Delete, VOLUME_KIND, name, e)),
        }
    }
}
