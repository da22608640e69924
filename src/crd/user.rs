//! # User
//!
//! Declarative identity resource, the root of reconciliation.

use serde::{Deserialize, Serialize};

/// User Custom Resource Definition
///
/// Every enabled User gets a ServiceAccount in the controller namespace,
/// the RBAC bindings listed in its spec, and eventually a Kubeconfig.
///
/// # Example
///
/// ```yaml
/// apiVersion: klum.cattle.io/v1alpha1
/// kind: User
/// metadata:
///   name: alice
/// spec:
///   clusterRoles:
///   - view
///   roles:
///   - namespace: dev
///     role: deployer
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema,
)]
#[kube(
    kind = "User",
    group = "klum.cattle.io",
    version = "v1alpha1",
    status = "crate::crd::UserStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    /// Absent or true keeps the user active; false removes every derived object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Cluster roles bound cluster-wide
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_roles: Vec<String>,
    /// Namespace-scoped bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<NamespaceRole>,
}

/// A Role or ClusterRole granted inside one namespace
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRole {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
}

impl UserSpec {
    /// `enabled: false` is the only value that disables a user
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

impl NamespaceRole {
    /// Entries need a namespace and at least one of role/clusterRole
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.namespace.is_empty() && !(self.role.is_empty() && self.cluster_role.is_empty())
    }
}
