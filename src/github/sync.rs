//! # Sync Engine
//!
//! Idempotent upload of a Kubeconfig to a GitHub secret.
//!
//! The YAML rendering of the Kubeconfig spec is hashed with SHA-256 and
//! compared with the hash recorded on the binding. Only a differing hash
//! leads to network calls; "never uploaded" and "changed" are the same case.
//! The engine never writes the hash itself: the caller records
//! `SyncOutcome::Uploaded { hash }` after the upload returned successfully.

use super::{crypto, KubeconfigSync, SecretStore, StoreConnector, SyncError};
use crate::constants::LAST_UPLOAD_HASH_ANNOTATION;
use crate::crd::{Kubeconfig, KubeconfigSpec, UserSyncGithub};
use crate::observability::metrics;
use async_trait::async_trait;
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

/// Result of an upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Stored hash matches, nothing was sent
    UpToDate,
    /// Secret written; `hash` should be recorded on the binding
    Uploaded { hash: String },
}

/// Uploads and deletes Kubeconfig secrets through a `StoreConnector`
#[derive(Debug)]
pub struct SyncEngine<C> {
    connector: C,
    /// Pause before every write, keeps bursts under GitHub's secondary rate limits
    throttle: Duration,
}

/// YAML document of a Kubeconfig spec, the exact bytes that get uploaded
pub fn render(spec: &KubeconfigSpec) -> Result<String, SyncError> {
    Ok(serde_yaml::to_string(spec)?)
}

/// Hex SHA-256 of the rendered Kubeconfig
#[must_use]
pub fn content_hash(rendered: &str) -> String {
    format!("{:x}", Sha256::digest(rendered.as_bytes()))
}

impl<C: StoreConnector> SyncEngine<C> {
    pub fn new(connector: C, throttle: Duration) -> Self {
        Self {
            connector,
            throttle,
        }
    }

    pub async fn upload(
        &self,
        binding: &UserSyncGithub,
        kubeconfig: &Kubeconfig,
    ) -> Result<SyncOutcome, SyncError> {
        let destination = &binding.spec.github;
        destination.validate()?;

        let rendered = render(&kubeconfig.spec)?;
        let hash = content_hash(&rendered);
        if binding.annotations().get(LAST_UPLOAD_HASH_ANNOTATION) == Some(&hash) {
            debug!(binding = %binding.name_any(), "Kubeconfig unchanged since last upload");
            return Ok(SyncOutcome::UpToDate);
        }

        let span = info_span!(
            "github.kubeconfig.upload",
            secret = %destination.secret_name,
            user = %binding.spec.user,
            repo = %destination.repo_slug(),
            env = %destination.environment
        );
        async move {
            tokio::time::sleep(self.throttle).await;
            info!("Adding secret");

            let result = async {
                let store = self
                    .connector
                    .connect(&destination.owner, &destination.repository)
                    .await?;
                let scope = store.resolve_scope(destination).await?;
                let key = store.public_key(&scope).await?;
                let sealed = crypto::seal(&key.key, rendered.as_bytes())?;
                store
                    .put_secret(&scope, &destination.secret_name, &sealed, &key.key_id)
                    .await
            }
            .await;

            metrics::increment_github_uploads(if result.is_ok() { "success" } else { "error" });
            result?;
            Ok::<_, SyncError>(SyncOutcome::Uploaded { hash })
        }
        .instrument(span)
        .await
    }

    pub async fn delete(&self, binding: &UserSyncGithub) -> Result<(), SyncError> {
        let destination = &binding.spec.github;
        destination.validate()?;

        let span = info_span!(
            "github.kubeconfig.delete",
            secret = %destination.secret_name,
            user = %binding.spec.user,
            repo = %destination.repo_slug(),
            env = %destination.environment
        );
        async move {
            tokio::time::sleep(self.throttle).await;
            info!("Deleting secret");

            let store = self
                .connector
                .connect(&destination.owner, &destination.repository)
                .await?;
            let scope = store.resolve_scope(destination).await?;
            store.delete_secret(&scope, &destination.secret_name).await?;
            metrics::increment_github_deletes();
            Ok::<_, SyncError>(())
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl<C> KubeconfigSync for SyncEngine<C>
where
    C: StoreConnector,
{
    async fn upload(
        &self,
        binding: &UserSyncGithub,
        kubeconfig: &Kubeconfig,
    ) -> Result<SyncOutcome, SyncError> {
        SyncEngine::upload(self, binding, kubeconfig).await
    }

    async fn delete(&self, binding: &UserSyncGithub) -> Result<(), SyncError> {
        SyncEngine::delete(self, binding).await
    }
}
