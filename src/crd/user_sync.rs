//! # UserSyncGithub
//!
//! Binds one user's Kubeconfig to an encrypted secret in a GitHub
//! repository or repository environment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// UserSyncGithub Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: klum.cattle.io/v1alpha1
/// kind: UserSyncGithub
/// metadata:
///   name: alice-ci
/// spec:
///   user: alice
///   github:
///     owner: acme
///     repository: infra
///     environment: production
///     secretName: KUBECONFIG
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[kube(
    kind = "UserSyncGithub",
    group = "klum.cattle.io",
    version = "v1alpha1",
    printcolumn = r#"{"name":"User", "type":"string", "jsonPath":".spec.user"}, {"name":"Repository", "type":"string", "jsonPath":".spec.github.repository"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserSyncGithubSpec {
    /// Name of the User whose Kubeconfig is mirrored
    pub user: String,
    pub github: GithubSyncSpec,
}

/// Destination of the mirrored secret
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GithubSyncSpec {
    pub owner: String,
    pub repository: String,
    /// Optional deployment environment; repository scope when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
    pub secret_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("github sync destination is missing required field(s): {}", .missing.join(", "))]
pub struct InvalidDestination {
    pub missing: Vec<&'static str>,
}

impl GithubSyncSpec {
    /// Fail fast on incomplete destinations before any network call
    pub fn validate(&self) -> Result<(), InvalidDestination> {
        let missing: Vec<&'static str> = [
            ("owner", &self.owner),
            ("repository", &self.repository),
            ("secretName", &self.secret_name),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(InvalidDestination { missing })
        }
    }

    /// Environment name when the secret is environment-scoped
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        Some(self.environment.as_str()).filter(|e| !e.is_empty())
    }

    /// `owner/repository`, used in logs
    #[must_use]
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }
}
