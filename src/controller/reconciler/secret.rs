//! # Credential Materialization
//!
//! Turns a populated ServiceAccount token Secret into the owning user's
//! `Kubeconfig`, and removes that Kubeconfig when the Secret goes away.
//!
//! A Secret is only acted on when every resolution guard holds: it is a
//! service-account token, its ServiceAccount exists with the UID recorded on
//! the Secret, and that ServiceAccount carries the `klum.cattle.io/user`
//! annotation. Anything else is ignored, not an error.
//!
//! Removal is delivered through the `klum.cattle.io/kubeconfig` finalizer,
//! which is placed on a Secret only once it resolves to a managed user.

use super::types::{backoff_key, is_not_found, KubeconfigSettings, Reconciler, ReconcilerError};
use crate::constants::{
    CA_CERT_KEY, FIELD_MANAGER, MANAGED_BY_LABEL, MANAGED_BY_VALUE, SECRET_FINALIZER,
    SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE, SERVICE_ACCOUNT_UID_ANNOTATION,
    TOKEN_KEY, USER_ANNOTATION, USER_LABEL,
};
use crate::controller::naming::label_value;
use crate::crd::{
    AuthInfo, Cluster, Context, Kubeconfig, KubeconfigSpec, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use crate::observability::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Cluster operations the credential pipeline needs
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// `Ok(None)` when the ServiceAccount does not exist
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, kube::Error>;

    /// Create or replace the Kubeconfig object
    async fn apply_kubeconfig(&self, kubeconfig: &Kubeconfig) -> Result<(), kube::Error>;

    async fn get_kubeconfig(&self, name: &str) -> Result<Option<Kubeconfig>, kube::Error>;

    /// Deleting an absent Kubeconfig succeeds
    async fn delete_kubeconfig(&self, name: &str) -> Result<(), kube::Error>;

    /// Replace the finalizer list of a Secret, but only while it still equals `expected`
    async fn set_secret_finalizers(
        &self,
        namespace: &str,
        name: &str,
        expected: Option<&[String]>,
        finalizers: &[String],
    ) -> Result<(), kube::Error>;
}

/// `CredentialBackend` talking to the API server
#[derive(Clone)]
pub struct KubeApiBackend {
    client: Client,
}

impl std::fmt::Debug for KubeApiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApiBackend").finish_non_exhaustive()
    }
}

impl KubeApiBackend {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialBackend for KubeApiBackend {
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, kube::Error> {
        Api::<ServiceAccount>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn apply_kubeconfig(&self, kubeconfig: &Kubeconfig) -> Result<(), kube::Error> {
        let api: Api<Kubeconfig> = Api::all(self.client.clone());
        api.patch(
            &kubeconfig.name_any(),
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(kubeconfig),
        )
        .await?;
        Ok(())
    }

    async fn get_kubeconfig(&self, name: &str) -> Result<Option<Kubeconfig>, kube::Error> {
        Api::<Kubeconfig>::all(self.client.clone()).get_opt(name).await
    }

    async fn delete_kubeconfig(&self, name: &str) -> Result<(), kube::Error> {
        let api: Api<Kubeconfig> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_secret_finalizers(
        &self,
        namespace: &str,
        name: &str,
        expected: Option<&[String]>,
        finalizers: &[String],
    ) -> Result<(), kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let patch = finalizer_patch(expected, finalizers).map_err(kube::Error::SerdeError)?;
        api.patch(name, &PatchParams::default(), &Patch::Json::<()>(patch))
            .await?;
        Ok(())
    }
}

/// JSON patch that swaps the finalizer list, failing if someone changed it since `expected` was read
///
/// The API server drops empty lists, so an empty `expected` is tested as absent.
pub fn finalizer_patch(
    expected: Option<&[String]>,
    finalizers: &[String],
) -> Result<json_patch::Patch, serde_json::Error> {
    let expected = expected.filter(|list| !list.is_empty());
    serde_json::from_value(serde_json::json!([
        { "op": "test", "path": "/metadata/finalizers", "value": expected },
        { "op": "add", "path": "/metadata/finalizers", "value": finalizers },
    ]))
}

/// What handling a Secret event amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretOutcome {
    /// Not a token Secret of a managed user
    Ignored,
    /// Managed, but the platform has not written the token yet
    AwaitingToken,
    /// Kubeconfig for `user` written
    Applied { user: String },
    /// Kubeconfig removed and finalizer released
    Removed,
}

/// Name of the managed user a token Secret belongs to, if any
pub async fn resolve_user_for_secret(
    backend: &dyn CredentialBackend,
    secret: &Secret,
) -> Result<Option<String>, ReconcilerError> {
    if secret.type_.as_deref() != Some(SERVICE_ACCOUNT_TOKEN_TYPE) {
        return Ok(None);
    }
    let annotations = secret.annotations();
    let Some(sa_name) = annotations.get(SERVICE_ACCOUNT_NAME_ANNOTATION) else {
        debug!(secret = %secret.name_any(), "Token Secret has no service account annotation");
        return Ok(None);
    };
    let Some(namespace) = secret.namespace() else {
        return Ok(None);
    };

    let Some(service_account) = backend.get_service_account(&namespace, sa_name).await? else {
        debug!(secret = %secret.name_any(), service_account = %sa_name, "Service account not found");
        return Ok(None);
    };

    let expected_uid = annotations.get(SERVICE_ACCOUNT_UID_ANNOTATION);
    if expected_uid.is_none() || service_account.metadata.uid.as_ref() != expected_uid {
        debug!(secret = %secret.name_any(), "Service account UID does not match the Secret");
        return Ok(None);
    }

    Ok(service_account
        .annotations()
        .get(USER_ANNOTATION)
        .filter(|user| !user.is_empty())
        .cloned())
}

fn secret_bytes<'a>(secret: &'a Secret, key: &str) -> &'a [u8] {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| bytes.0.as_slice())
        .unwrap_or_default()
}

/// Kubeconfig granting `user` the Secret's token
pub fn build_kubeconfig(
    user: &str,
    secret: &Secret,
    settings: &KubeconfigSettings,
) -> Result<Kubeconfig, ReconcilerError> {
    let uid = secret.uid().ok_or(ReconcilerError::MissingObjectKey {
        kind: "Secret",
        field: "metadata.uid",
    })?;

    let certificate_authority_data = if settings.ca.is_empty() {
        general_purpose::STANDARD.encode(secret_bytes(secret, CA_CERT_KEY))
    } else {
        settings.ca.clone()
    };
    let token = String::from_utf8_lossy(secret_bytes(secret, TOKEN_KEY)).into_owned();

    let mut kubeconfig = Kubeconfig::new(
        user,
        KubeconfigSpec {
            clusters: vec![NamedCluster {
                name: settings.context_name.clone(),
                cluster: Cluster {
                    server: settings.server.clone(),
                    certificate_authority_data,
                },
            }],
            auth_infos: vec![NamedAuthInfo {
                name: user.to_string(),
                auth_info: AuthInfo { token },
            }],
            contexts: vec![NamedContext {
                name: settings.context_name.clone(),
                context: Context {
                    cluster: settings.context_name.clone(),
                    auth_info: user.to_string(),
                },
            }],
            current_context: settings.context_name.clone(),
        },
    );
    kubeconfig.metadata.labels = Some(BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (USER_LABEL.to_string(), label_value(user)),
    ]));
    kubeconfig.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "v1".to_string(),
        kind: "Secret".to_string(),
        name: secret.name_any(),
        uid,
        block_owner_deletion: Some(true),
        controller: Some(false),
    }]);
    Ok(kubeconfig)
}

fn token_is_empty(secret: &Secret) -> bool {
    secret_bytes(secret, TOKEN_KEY).is_empty()
}

async fn materialize(
    backend: &dyn CredentialBackend,
    settings: &KubeconfigSettings,
    user: &str,
    secret: &Secret,
) -> Result<(), ReconcilerError> {
    let kubeconfig = build_kubeconfig(user, secret, settings)?;
    backend.apply_kubeconfig(&kubeconfig).await?;
    metrics::increment_kubeconfigs_applied();
    info!(user = %user, "Applied kubeconfig");
    Ok(())
}

/// Handle a created or updated token Secret
///
/// Claims the Secret with [`SECRET_FINALIZER`] once it resolves to a user,
/// then writes the Kubeconfig as soon as the token is populated.
pub async fn on_secret_change(
    backend: &dyn CredentialBackend,
    settings: &KubeconfigSettings,
    secret: &Secret,
) -> Result<SecretOutcome, ReconcilerError> {
    let Some(user) = resolve_user_for_secret(backend, secret).await? else {
        return Ok(SecretOutcome::Ignored);
    };

    if !secret.finalizers().iter().any(|f| f == SECRET_FINALIZER) {
        let mut finalizers = secret.finalizers().to_vec();
        finalizers.push(SECRET_FINALIZER.to_string());
        backend
            .set_secret_finalizers(
                &secret_namespace(secret)?,
                &secret.name_any(),
                secret.metadata.finalizers.as_deref(),
                &finalizers,
            )
            .await?;
    }

    if token_is_empty(secret) {
        debug!(secret = %secret.name_any(), "Token not populated yet");
        return Ok(SecretOutcome::AwaitingToken);
    }

    materialize(backend, settings, &user, secret).await?;
    Ok(SecretOutcome::Applied { user })
}

fn secret_namespace(secret: &Secret) -> Result<String, ReconcilerError> {
    secret.namespace().ok_or(ReconcilerError::MissingObjectKey {
        kind: "Secret",
        field: "metadata.namespace",
    })
}

/// Delete the Kubeconfig produced from a removed token Secret
///
/// When the user no longer resolves (its ServiceAccount is already gone),
/// the Kubeconfig named after the ServiceAccount is removed only if it is
/// owned by this very Secret.
pub async fn on_secret_removed(
    backend: &dyn CredentialBackend,
    secret: &Secret,
) -> Result<bool, ReconcilerError> {
    let name = match resolve_user_for_secret(backend, secret).await? {
        Some(user) => user,
        None => {
            let owned = match secret.annotations().get(SERVICE_ACCOUNT_NAME_ANNOTATION) {
                Some(sa_name) => backend
                    .get_kubeconfig(sa_name)
                    .await?
                    .filter(|kc| owned_by(kc, secret)),
                None => None,
            };
            match owned {
                Some(kubeconfig) => kubeconfig.name_any(),
                None => return Ok(false),
            }
        }
    };

    if backend.get_kubeconfig(&name).await?.is_none() {
        return Ok(false);
    }
    backend.delete_kubeconfig(&name).await?;
    info!(user = %name, "Deleted kubeconfig");
    Ok(true)
}

fn owned_by(kubeconfig: &Kubeconfig, secret: &Secret) -> bool {
    let Some(uid) = secret.uid() else {
        return false;
    };
    kubeconfig
        .owner_references()
        .iter()
        .any(|owner| owner.kind == "Secret" && owner.uid == uid)
}

/// Full Secret event handling, finalizer bookkeeping included
pub async fn handle_secret(
    backend: &dyn CredentialBackend,
    settings: &KubeconfigSettings,
    secret: &Secret,
) -> Result<SecretOutcome, ReconcilerError> {
    if secret.metadata.deletion_timestamp.is_none() {
        return on_secret_change(backend, settings, secret).await;
    }
    if !secret.finalizers().iter().any(|f| f == SECRET_FINALIZER) {
        return Ok(SecretOutcome::Ignored);
    }

    let namespace = secret_namespace(secret)?;
    on_secret_removed(backend, secret).await?;
    let remaining: Vec<String> = secret
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != SECRET_FINALIZER)
        .cloned()
        .collect();
    backend
        .set_secret_finalizers(
            &namespace,
            &secret.name_any(),
            secret.metadata.finalizers.as_deref(),
            &remaining,
        )
        .await?;
    Ok(SecretOutcome::Removed)
}

/// Reconcile entry point for token Secrets
pub async fn reconcile_secret(
    secret: Arc<Secret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let span = info_span!(
        "reconcile",
        resource.kind = "Secret",
        resource.name = %secret.name_any(),
        resource.namespace = secret.namespace().as_deref().unwrap_or_default()
    );

    async move {
        metrics::increment_reconciliations("Secret");
        let outcome = handle_secret(ctx.backend.as_ref(), &ctx.kubeconfig, &secret).await?;
        debug!(?outcome, "Secret handled");

        ctx.backoff_states.clear(&backoff_key(
            "Secret",
            secret.namespace().as_deref(),
            &secret.name_any(),
        ));
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        Ok::<_, ReconcilerError>(Action::await_change())
    }
    .instrument(span)
    .await
}
