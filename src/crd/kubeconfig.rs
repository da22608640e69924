//! # Kubeconfig
//!
//! Cluster-scoped, downloadable kubeconfig materialized from a token Secret.
//! Field names follow the kubeconfig file format so `spec` can be written
//! out verbatim.

use serde::{Deserialize, Serialize};

/// Kubeconfig Custom Resource Definition
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[kube(kind = "Kubeconfig", group = "klum.cattle.io", version = "v1alpha1")]
pub struct KubeconfigSpec {
    pub clusters: Vec<NamedCluster>,
    /// Map of referencable names to user configs
    #[serde(rename = "users")]
    pub auth_infos: Vec<NamedAuthInfo>,
    /// Map of referencable names to context configs
    pub contexts: Vec<NamedContext>,
    /// Name of the context used by default
    #[serde(rename = "current-context")]
    pub current_context: String,
}

/// Relates a nickname to cluster information
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

/// How to reach a Kubernetes API server
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Cluster {
    /// Address of the API server (https://hostname:port)
    pub server: String,
    /// Base64 PEM-encoded certificate authority bundle
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub certificate_authority_data: String,
}

/// Relates a nickname to auth information
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct NamedAuthInfo {
    pub name: String,
    #[serde(rename = "user")]
    pub auth_info: AuthInfo,
}

/// Identity presented to the cluster
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct AuthInfo {
    /// Bearer token
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo").field("token", &"***").finish()
    }
}

/// Pair of cluster and auth-info references
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Context {
    pub cluster: String,
    #[serde(rename = "user")]
    pub auth_info: String,
}

/// Relates a nickname to a context
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_uses_kubeconfig_file_field_names() {
        let spec = KubeconfigSpec {
            clusters: vec![NamedCluster {
                name: "default".into(),
                cluster: Cluster {
                    server: "https://k8s:6443".into(),
                    certificate_authority_data: "Q0E=".into(),
                },
            }],
            auth_infos: vec![NamedAuthInfo {
                name: "alice".into(),
                auth_info: AuthInfo { token: "t".into() },
            }],
            contexts: vec![NamedContext {
                name: "default".into(),
                context: Context {
                    cluster: "default".into(),
                    auth_info: "alice".into(),
                },
            }],
            current_context: "default".into(),
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["current-context"], "default");
        assert_eq!(value["users"][0]["user"]["token"], "t");
        assert_eq!(value["contexts"][0]["context"]["user"], "alice");
        assert_eq!(value["clusters"][0]["cluster"]["certificate-authority-data"], "Q0E=");
    }

    #[test]
    fn test_auth_info_debug_redacts_token() {
        let info = AuthInfo { token: "super-secret".into() };
        assert!(!format!("{info:?}").contains("super-secret"));
    }
}
