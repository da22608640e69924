//! # Desired State
//!
//! Pure translation of a `User` into the objects that must exist for it.
//!
//! Output order is stable: ServiceAccount, token Secret (1.24+), then
//! ClusterRoleBindings in spec order, then RoleBindings in spec order.
//! Role entries with both `role` and `clusterRole` produce one RoleBinding
//! for each. Entries without a namespace, or with neither role field, are
//! skipped and reported through the `RolesValid` condition.

use crate::constants::{
    MANAGED_BY_LABEL, MANAGED_BY_VALUE, RBAC_API_GROUP, READY_CONDITION, ROLES_VALID_CONDITION,
    SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_TYPE, USER_ANNOTATION, USER_LABEL,
};
use crate::controller::naming::{derive_name, label_value};
use crate::controller::version::PlatformVersion;
use crate::crd::{remove_condition, set_condition, User, UserStatus};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Static process settings the generator depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Namespace holding every ServiceAccount and token Secret
    pub namespace: String,
    /// Bound when a User lists no roles at all; empty disables the fallback
    pub default_cluster_role: String,
}

/// One object the cluster should contain
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredObject {
    ServiceAccount(ServiceAccount),
    Secret(Secret),
    ClusterRoleBinding(ClusterRoleBinding),
    RoleBinding(RoleBinding),
}

impl DesiredObject {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "ServiceAccount",
            Self::Secret(_) => "Secret",
            Self::ClusterRoleBinding(_) => "ClusterRoleBinding",
            Self::RoleBinding(_) => "RoleBinding",
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::ServiceAccount(o) => &o.metadata,
            Self::Secret(o) => &o.metadata,
            Self::ClusterRoleBinding(o) => &o.metadata,
            Self::RoleBinding(o) => &o.metadata,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }

    /// `(kind, namespace, name)`, the identity used when pruning
    #[must_use]
    pub fn key(&self) -> (&'static str, String, String) {
        (
            self.kind(),
            self.namespace().unwrap_or_default().to_string(),
            self.name().to_string(),
        )
    }
}

/// Everything one reconcile of a User should converge to
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub objects: Vec<DesiredObject>,
    pub status: UserStatus,
    /// Indices into `spec.roles` that were skipped as malformed
    pub skipped_roles: Vec<usize>,
}

impl DesiredState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}

/// Compute the desired object set and status for `user`
#[must_use]
pub fn generate(user: &User, cfg: &GeneratorConfig, version: PlatformVersion) -> DesiredState {
    let status = user.status.clone().unwrap_or_default();

    if !user.spec.is_enabled() {
        let status = set_condition(status, READY_CONDITION, false, Some("Disabled"), None);
        return DesiredState {
            objects: Vec::new(),
            status: remove_condition(status, ROLES_VALID_CONDITION),
            skipped_roles: Vec::new(),
        };
    }

    let user_name = user.name_any();
    let meta = MetaTemplate::new(user);
    let mut objects = Vec::new();

    objects.push(DesiredObject::ServiceAccount(ServiceAccount {
        metadata: meta.object(
            &user_name,
            Some(&cfg.namespace),
            BTreeMap::from([(USER_ANNOTATION.to_string(), user_name.clone())]),
        ),
        ..Default::default()
    }));

    if version.requires_manual_token_secret() {
        objects.push(DesiredObject::Secret(Secret {
            metadata: meta.object(
                &user_name,
                Some(&cfg.namespace),
                BTreeMap::from([(SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(), user_name.clone())]),
            ),
            type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
            ..Default::default()
        }));
    }

    let subjects = vec![Subject {
        kind: "ServiceAccount".to_string(),
        name: user_name.clone(),
        namespace: Some(cfg.namespace.clone()),
        api_group: None,
    }];

    let mut skipped_roles = Vec::new();

    if user.spec.cluster_roles.is_empty() && user.spec.roles.is_empty() {
        if !cfg.default_cluster_role.is_empty() {
            objects.push(cluster_role_binding(
                &meta,
                &user_name,
                &cfg.default_cluster_role,
                &subjects,
            ));
        }
    } else {
        for cluster_role in &user.spec.cluster_roles {
            objects.push(cluster_role_binding(&meta, &user_name, cluster_role, &subjects));
        }

        for (index, entry) in user.spec.roles.iter().enumerate() {
            if !entry.is_valid() {
                skipped_roles.push(index);
                continue;
            }
            if !entry.role.is_empty() {
                objects.push(DesiredObject::RoleBinding(RoleBinding {
                    metadata: meta.object(
                        &derive_name(&user_name, &entry.namespace, "", &entry.role),
                        Some(&entry.namespace),
                        BTreeMap::new(),
                    ),
                    role_ref: role_ref("Role", &entry.role),
                    subjects: Some(subjects.clone()),
                }));
            }
            if !entry.cluster_role.is_empty() {
                objects.push(DesiredObject::RoleBinding(RoleBinding {
                    metadata: meta.object(
                        &derive_name(&user_name, &entry.namespace, &entry.cluster_role, ""),
                        Some(&entry.namespace),
                        BTreeMap::new(),
                    ),
                    role_ref: role_ref("ClusterRole", &entry.cluster_role),
                    subjects: Some(subjects.clone()),
                }));
            }
        }
    }

    let status = if skipped_roles.is_empty() {
        set_condition(status, ROLES_VALID_CONDITION, true, None, None)
    } else {
        let indices = skipped_roles
            .iter()
            .map(|i| format!("roles[{i}]"))
            .collect::<Vec<_>>()
            .join(", ");
        set_condition(
            status,
            ROLES_VALID_CONDITION,
            false,
            Some("InvalidRoleEntries"),
            Some(&format!(
                "{indices} skipped: a namespace and a role or clusterRole are required"
            )),
        )
    };

    DesiredState {
        objects,
        status: set_condition(status, READY_CONDITION, true, None, None),
        skipped_roles,
    }
}

fn cluster_role_binding(
    meta: &MetaTemplate,
    user_name: &str,
    cluster_role: &str,
    subjects: &[Subject],
) -> DesiredObject {
    DesiredObject::ClusterRoleBinding(ClusterRoleBinding {
        metadata: meta.object(
            &derive_name(user_name, "", cluster_role, ""),
            None,
            BTreeMap::new(),
        ),
        role_ref: role_ref("ClusterRole", cluster_role),
        subjects: Some(subjects.to_vec()),
    })
}

fn role_ref(kind: &str, name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

/// Labels and owner reference shared by every object of one User
struct MetaTemplate {
    labels: BTreeMap<String, String>,
    owner: Option<OwnerReference>,
}

impl MetaTemplate {
    fn new(user: &User) -> Self {
        Self {
            labels: BTreeMap::from([
                (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
                (USER_LABEL.to_string(), label_value(&user.name_any())),
            ]),
            owner: user.controller_owner_ref(&()),
        }
    }

    fn object(
        &self,
        name: &str,
        namespace: Option<&str>,
        annotations: BTreeMap<String, String>,
    ) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            labels: Some(self.labels.clone()),
            annotations: (!annotations.is_empty()).then_some(annotations),
            owner_references: self.owner.clone().map(|o| vec![o]),
            ..Default::default()
        }
    }
}
