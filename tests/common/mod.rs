//! Common test utilities
//!
//! rustls setup for tests that open HTTP connections, plus in-memory fakes
//! for the cluster and GitHub seams.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use crypto_box::{aead::OsRng, SecretKey};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::ByteString;
use klum_controller::constants::{
    CA_CERT_KEY, SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE,
    SERVICE_ACCOUNT_UID_ANNOTATION, TOKEN_KEY, USER_ANNOTATION,
};
use klum_controller::controller::reconciler::{CredentialBackend, KubeconfigSettings};
use klum_controller::crd::{GithubSyncSpec, Kubeconfig, UserSyncGithub, UserSyncGithubSpec};
use klum_controller::github::{
    PublicKeyResponse, SecretScope, SecretStore, StoreConnector, SyncError,
};
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "klum";
pub const SA_UID: &str = "0b6c5a8e-sa";
pub const SECRET_UID: &str = "5d1f9e2a-secret";

pub fn settings() -> KubeconfigSettings {
    KubeconfigSettings {
        context_name: "default".into(),
        server: "https://k8s.example.com:6443".into(),
        ca: String::new(),
    }
}

pub fn service_account(name: &str, uid: &str, user: Option<&str>) -> ServiceAccount {
    let mut sa = ServiceAccount::default();
    sa.metadata.name = Some(name.into());
    sa.metadata.namespace = Some(NAMESPACE.into());
    sa.metadata.uid = Some(uid.into());
    if let Some(user) = user {
        sa.metadata.annotations = Some(BTreeMap::from([(USER_ANNOTATION.into(), user.into())]));
    }
    sa
}

pub fn token_secret(sa_name: &str, sa_uid: &str, token: &[u8]) -> Secret {
    let mut secret = Secret {
        type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.into()),
        data: Some(BTreeMap::from([
            (TOKEN_KEY.to_string(), ByteString(token.to_vec())),
            (CA_CERT_KEY.to_string(), ByteString(b"CA".to_vec())),
        ])),
        ..Default::default()
    };
    secret.metadata.name = Some(sa_name.into());
    secret.metadata.namespace = Some(NAMESPACE.into());
    secret.metadata.uid = Some(SECRET_UID.into());
    secret.metadata.annotations = Some(BTreeMap::from([
        (SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(), sa_name.to_string()),
        (SERVICE_ACCOUNT_UID_ANNOTATION.to_string(), sa_uid.to_string()),
    ]));
    secret
}

/// API error as the server would return it
pub fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".into(),
        message: format!("injected {code}"),
        reason: "ServiceUnavailable".into(),
        code,
    })
}

/// In-memory cluster holding ServiceAccounts, Kubeconfigs and Secret finalizers
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub service_accounts: Mutex<HashMap<String, ServiceAccount>>,
    pub kubeconfigs: Mutex<HashMap<String, Kubeconfig>>,
    /// Finalizer lists written, in order
    pub finalizer_patches: Mutex<Vec<Vec<String>>>,
    /// Lists each finalizer write was guarded on
    pub finalizer_expectations: Mutex<Vec<Option<Vec<String>>>>,
    pub applies: Mutex<usize>,
    /// Status code returned by ServiceAccount reads while set
    pub fail_get_service_account: Mutex<Option<u16>>,
    /// Status code returned by Kubeconfig deletes while set
    pub fail_delete: Mutex<Option<u16>>,
}

impl FakeBackend {
    pub fn with_service_account(sa: ServiceAccount) -> Self {
        let backend = Self::default();
        backend
            .service_accounts
            .lock()
            .unwrap()
            .insert(sa.name_any(), sa);
        backend
    }

    pub fn kubeconfig(&self, name: &str) -> Option<Kubeconfig> {
        self.kubeconfigs.lock().unwrap().get(name).cloned()
    }

    pub fn apply_count(&self) -> usize {
        *self.applies.lock().unwrap()
    }

    pub fn last_finalizers(&self) -> Option<Vec<String>> {
        self.finalizer_patches.lock().unwrap().last().cloned()
    }

    pub fn set_fail_get_service_account(&self, code: Option<u16>) {
        *self.fail_get_service_account.lock().unwrap() = code;
    }

    pub fn set_fail_delete(&self, code: Option<u16>) {
        *self.fail_delete.lock().unwrap() = code;
    }
}

#[async_trait]
impl CredentialBackend for FakeBackend {
    async fn get_service_account(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, kube::Error> {
        if let Some(code) = *self.fail_get_service_account.lock().unwrap() {
            return Err(api_error(code));
        }
        Ok(self.service_accounts.lock().unwrap().get(name).cloned())
    }

    async fn apply_kubeconfig(&self, kubeconfig: &Kubeconfig) -> Result<(), kube::Error> {
        *self.applies.lock().unwrap() += 1;
        self.kubeconfigs
            .lock()
            .unwrap()
            .insert(kubeconfig.name_any(), kubeconfig.clone());
        Ok(())
    }

    async fn get_kubeconfig(&self, name: &str) -> Result<Option<Kubeconfig>, kube::Error> {
        Ok(self.kubeconfig(name))
    }

    async fn delete_kubeconfig(&self, name: &str) -> Result<(), kube::Error> {
        if let Some(code) = *self.fail_delete.lock().unwrap() {
            return Err(api_error(code));
        }
        self.kubeconfigs.lock().unwrap().remove(name);
        Ok(())
    }

    async fn set_secret_finalizers(
        &self,
        _namespace: &str,
        _name: &str,
        expected: Option<&[String]>,
        finalizers: &[String],
    ) -> Result<(), kube::Error> {
        self.finalizer_expectations
            .lock()
            .unwrap()
            .push(expected.map(<[String]>::to_vec));
        self.finalizer_patches
            .lock()
            .unwrap()
            .push(finalizers.to_vec());
        Ok(())
    }
}

/// One observed call against the fake GitHub store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Connect { owner: String, repository: String },
    PublicKey(SecretScope),
    Put { scope: SecretScope, name: String, encrypted_value: String },
    Delete { scope: SecretScope, name: String },
}

/// Fake GitHub: a call log, a real sealed-box key pair and optional failures
#[derive(Clone)]
pub struct FakeGithub {
    pub calls: Arc<Mutex<Vec<StoreCall>>>,
    pub fail_put: Arc<Mutex<bool>>,
    pub fail_delete: Arc<Mutex<bool>>,
    secret_key: Arc<SecretKey>,
}

impl Default for FakeGithub {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            fail_put: Arc::default(),
            fail_delete: Arc::default(),
            secret_key: Arc::new(SecretKey::generate(&mut OsRng)),
        }
    }
}

impl FakeGithub {
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::Put { .. }))
            .collect()
    }

    pub fn set_fail_put(&self, fail: bool) {
        *self.fail_put.lock().unwrap() = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        *self.fail_delete.lock().unwrap() = fail;
    }

    /// Decrypt an uploaded value with the fake's secret key
    pub fn open(&self, encrypted_value: &str) -> String {
        let sealed = general_purpose::STANDARD.decode(encrypted_value).unwrap();
        String::from_utf8(self.secret_key.unseal(&sealed).unwrap()).unwrap()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SecretStore for FakeGithub {
    async fn resolve_scope(&self, destination: &GithubSyncSpec) -> Result<SecretScope, SyncError> {
        Ok(match destination.environment() {
            Some(environment) => SecretScope::Environment {
                repository_id: 42,
                environment: environment.to_string(),
            },
            None => SecretScope::Repository {
                owner: destination.owner.clone(),
                repository: destination.repository.clone(),
            },
        })
    }

    async fn public_key(&self, scope: &SecretScope) -> Result<PublicKeyResponse, SyncError> {
        self.record(StoreCall::PublicKey(scope.clone()));
        Ok(PublicKeyResponse {
            key_id: "key-1".into(),
            key: general_purpose::STANDARD.encode(self.secret_key.public_key().as_bytes()),
        })
    }

    async fn put_secret(
        &self,
        scope: &SecretScope,
        name: &str,
        encrypted_value: &str,
        _key_id: &str,
    ) -> Result<(), SyncError> {
        if *self.fail_put.lock().unwrap() {
            return Err(SyncError::Api {
                status: 500,
                body: "boom".into(),
            });
        }
        self.record(StoreCall::Put {
            scope: scope.clone(),
            name: name.into(),
            encrypted_value: encrypted_value.into(),
        });
        Ok(())
    }

    async fn delete_secret(&self, scope: &SecretScope, name: &str) -> Result<(), SyncError> {
        if *self.fail_delete.lock().unwrap() {
            return Err(SyncError::Api {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        self.record(StoreCall::Delete {
            scope: scope.clone(),
            name: name.into(),
        });
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for FakeGithub {
    type Store = FakeGithub;

    async fn connect(&self, owner: &str, repository: &str) -> Result<FakeGithub, SyncError> {
        self.record(StoreCall::Connect {
            owner: owner.into(),
            repository: repository.into(),
        });
        Ok(self.clone())
    }
}

pub fn binding(environment: &str) -> UserSyncGithub {
    UserSyncGithub::new(
        "alice-ci",
        UserSyncGithubSpec {
            user: "alice".into(),
            github: GithubSyncSpec {
                owner: "acme".into(),
                repository: "infra".into(),
                environment: environment.into(),
                secret_name: "KUBECONFIG".into(),
            },
        },
    )
}
