//! # GitHub Secret Sync
//!
//! Mirrors a user's Kubeconfig into a GitHub Actions secret, sealed against
//! the destination's public key.
//!
//! - `auth.rs` - Token and GitHub App authentication, the `GithubConnector`
//! - `client.rs` - REST client for repository and environment secrets
//! - `crypto.rs` - Sealed-box encryption
//! - `requests.rs` / `responses.rs` - Wire types
//! - `sync.rs` - The content-hash gated `SyncEngine`
//!
//! `SecretStore` and `StoreConnector` are the seams between the engine and
//! the network, so the engine can be exercised without GitHub.

pub mod auth;
pub mod client;
pub mod crypto;
pub mod requests;
pub mod responses;
pub mod sync;

use crate::crd::{GithubSyncSpec, InvalidDestination, Kubeconfig, UserSyncGithub};
use async_trait::async_trait;
use thiserror::Error;

pub use auth::GithubConnector;
pub use client::GithubClient;
pub use responses::PublicKeyResponse;
pub use sync::{SyncEngine, SyncOutcome};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidDestination(#[from] InvalidDestination),
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("sealing the secret failed: {0}")]
    Encryption(String),
    #[error("failed to sign GitHub App token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("failed to serialize kubeconfig: {0}")]
    Serialization(#[from] serde_yaml::Error),
    #[error("invalid request URL: {0}")]
    Url(String),
}

/// Where a secret lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretScope {
    Repository { owner: String, repository: String },
    Environment { repository_id: u64, environment: String },
}

impl SecretScope {
    /// Path segments of the scope's secrets collection
    #[must_use]
    pub fn secrets_segments(&self) -> Vec<String> {
        match self {
            Self::Repository { owner, repository } => vec![
                "repos".to_string(),
                owner.clone(),
                repository.clone(),
                "actions".to_string(),
                "secrets".to_string(),
            ],
            Self::Environment {
                repository_id,
                environment,
            } => vec![
                "repositories".to_string(),
                repository_id.to_string(),
                "environments".to_string(),
                environment.clone(),
                "secrets".to_string(),
            ],
        }
    }

    /// Short form for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Repository { owner, repository } => format!("{owner}/{repository}"),
            Self::Environment {
                repository_id,
                environment,
            } => format!("repository {repository_id} environment {environment}"),
        }
    }
}

/// An authenticated secret store for one repository
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Repository scope, or environment scope after resolving the repository id
    async fn resolve_scope(&self, destination: &GithubSyncSpec) -> Result<SecretScope, SyncError>;

    async fn public_key(&self, scope: &SecretScope) -> Result<PublicKeyResponse, SyncError>;

    /// Create or replace a named secret
    async fn put_secret(
        &self,
        scope: &SecretScope,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<(), SyncError>;

    async fn delete_secret(&self, scope: &SecretScope, name: &str) -> Result<(), SyncError>;
}

/// Produces a `SecretStore` authenticated for a repository
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: SecretStore;

    async fn connect(&self, owner: &str, repository: &str) -> Result<Self::Store, SyncError>;
}

/// What the sync reconciler needs from the engine
#[async_trait]
pub trait KubeconfigSync: Send + Sync {
    async fn upload(
        &self,
        binding: &UserSyncGithub,
        kubeconfig: &Kubeconfig,
    ) -> Result<SyncOutcome, SyncError>;

    async fn delete(&self, binding: &UserSyncGithub) -> Result<(), SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_paths() {
        let repo = SecretScope::Repository {
            owner: "acme".into(),
            repository: "infra".into(),
        };
        assert_eq!(repo.secrets_segments().join("/"), "repos/acme/infra/actions/secrets");

        let env = SecretScope::Environment {
            repository_id: 42,
            environment: "prod".into(),
        };
        assert_eq!(
            env.secrets_segments().join("/"),
            "repositories/42/environments/prod/secrets"
        );
    }
}
