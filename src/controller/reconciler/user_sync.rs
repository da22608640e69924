//! # GitHub Sync Reconciliation
//!
//! Mirrors the Kubeconfig named by a `UserSyncGithub` binding into GitHub and
//! removes the GitHub secret again when the binding is deleted. Deletion is
//! driven by the `klum.cattle.io/github-sync` finalizer.

use super::secret::CredentialBackend;
use super::types::{backoff_key, Reconciler, ReconcilerError};
use crate::constants::{GITHUB_SYNC_FINALIZER, LAST_UPLOAD_HASH_ANNOTATION};
use crate::crd::UserSyncGithub;
use crate::github::{KubeconfigSync, SyncError, SyncOutcome};
use crate::observability::metrics;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event as FinalizerEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Upload the binding's Kubeconfig; `None` when there is nothing to upload yet
pub async fn upload_binding(
    backend: &dyn CredentialBackend,
    sync: &dyn KubeconfigSync,
    binding: &UserSyncGithub,
) -> Result<Option<SyncOutcome>, ReconcilerError> {
    let Some(kubeconfig) = backend.get_kubeconfig(&binding.spec.user).await? else {
        debug!(user = %binding.spec.user, "Kubeconfig does not exist yet");
        return Ok(None);
    };
    Ok(Some(sync.upload(binding, &kubeconfig).await?))
}

async fn apply_binding(
    binding: Arc<UserSyncGithub>,
    ctx: &Reconciler,
    sync: &dyn KubeconfigSync,
) -> Result<Action, ReconcilerError> {
    let outcome = upload_binding(ctx.backend.as_ref(), sync, &binding).await?;

    if let Some(SyncOutcome::Uploaded { hash }) = outcome {
        let api: Api<UserSyncGithub> = Api::all(ctx.client.clone());
        let patch = serde_json::json!({
            "metadata": { "annotations": { LAST_UPLOAD_HASH_ANNOTATION: hash } }
        });
        api.patch(&binding.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        info!("Recorded uploaded kubeconfig hash");
    }

    Ok(Action::await_change())
}

/// Delete the binding's GitHub secret
///
/// A destination that never validated cannot have been uploaded to, so it is
/// skipped and the binding may go.
pub async fn delete_binding(
    sync: &dyn KubeconfigSync,
    binding: &UserSyncGithub,
) -> Result<(), ReconcilerError> {
    match sync.delete(binding).await {
        Err(SyncError::InvalidDestination(e)) => {
            warn!(error = %e, "Destination is invalid, nothing to delete");
            Ok(())
        }
        result => Ok(result?),
    }
}

async fn cleanup_binding(
    binding: Arc<UserSyncGithub>,
    sync: &dyn KubeconfigSync,
) -> Result<Action, ReconcilerError> {
    delete_binding(sync, &binding).await?;
    Ok(Action::await_change())
}

/// Reconcile entry point for `UserSyncGithub` bindings
pub async fn reconcile_user_sync(
    binding: Arc<UserSyncGithub>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = binding.name_any();
    let span = info_span!(
        "reconcile",
        resource.kind = "UserSyncGithub",
        resource.name = %name,
        user = %binding.spec.user
    );

    async move {
        metrics::increment_reconciliations("UserSyncGithub");
        let Some(sync) = ctx.sync.clone() else {
            debug!("GitHub sync is not configured");
            return Ok(Action::await_change());
        };

        let api: Api<UserSyncGithub> = Api::all(ctx.client.clone());
        let action = finalizer(&api, GITHUB_SYNC_FINALIZER, binding, |event| async {
            match event {
                FinalizerEvent::Apply(binding) => apply_binding(binding, &ctx, sync.as_ref()).await,
                FinalizerEvent::Cleanup(binding) => cleanup_binding(binding, sync.as_ref()).await,
            }
        })
        .await
        .map_err(|e| ReconcilerError::Finalizer(Box::new(e)))?;

        ctx.backoff_states.clear(&backoff_key("UserSyncGithub", None, &name));
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        Ok::<_, ReconcilerError>(action)
    }
    .instrument(span)
    .await
}
