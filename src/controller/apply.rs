//! # Object-Set Applier
//!
//! Converges the cluster onto a User's desired object set: server-side apply
//! for everything desired, then delete labelled objects of the same user
//! that are no longer part of the set.

use crate::constants::{FIELD_MANAGER, MANAGED_BY_LABEL, MANAGED_BY_VALUE, USER_LABEL};
use crate::controller::desired_state::DesiredObject;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use tracing::{debug, info};

type ObjectKey = (&'static str, String, String);

/// Counts of what one apply pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub pruned: usize,
}

/// Applies desired object sets owned by Users
#[derive(Clone)]
pub struct ObjectSetApplier {
    client: Client,
    /// Namespace holding ServiceAccounts and token Secrets
    namespace: String,
}

impl std::fmt::Debug for ObjectSetApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectSetApplier")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ObjectSetApplier {
    #[must_use]
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Apply `objects` and prune everything else labelled with `user_label`
    pub async fn apply(
        &self,
        user_label: &str,
        objects: &[DesiredObject],
    ) -> Result<ApplyReport, kube::Error> {
        let mut report = ApplyReport::default();

        for object in objects {
            match object {
                DesiredObject::ServiceAccount(sa) => {
                    self.apply_one(&self.namespaced::<ServiceAccount>(object), sa).await?;
                }
                DesiredObject::Secret(secret) => {
                    self.apply_one(&self.namespaced::<Secret>(object), secret).await?;
                }
                DesiredObject::ClusterRoleBinding(crb) => {
                    let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
                    self.apply_one(&api, crb).await?;
                }
                DesiredObject::RoleBinding(rb) => {
                    self.apply_one(&self.namespaced::<RoleBinding>(object), rb).await?;
                }
            }
            report.applied += 1;
        }

        let desired: HashSet<ObjectKey> = objects.iter().map(DesiredObject::key).collect();
        let selector = format!("{USER_LABEL}={user_label},{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}");

        let client = &self.client;
        report.pruned += prune(
            Api::<ServiceAccount>::namespaced(client.clone(), &self.namespace),
            |ns| Api::namespaced(client.clone(), ns),
            "ServiceAccount",
            &selector,
            &desired,
        )
        .await?;
        report.pruned += prune(
            Api::<Secret>::namespaced(client.clone(), &self.namespace),
            |ns| Api::namespaced(client.clone(), ns),
            "Secret",
            &selector,
            &desired,
        )
        .await?;
        report.pruned += prune(
            Api::<ClusterRoleBinding>::all(client.clone()),
            |_| Api::all(client.clone()),
            "ClusterRoleBinding",
            &selector,
            &desired,
        )
        .await?;
        report.pruned += prune(
            Api::<RoleBinding>::all(client.clone()),
            |ns| Api::namespaced(client.clone(), ns),
            "RoleBinding",
            &selector,
            &desired,
        )
        .await?;

        Ok(report)
    }

    fn namespaced<K>(&self, object: &DesiredObject) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = object.namespace().unwrap_or(&self.namespace);
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn apply_one<K>(&self, api: &Api<K>, object: &K) -> Result<(), kube::Error>
    where
        K: Resource + Serialize + Clone + DeserializeOwned + Debug,
    {
        let name = object.meta().name.clone().unwrap_or_default();
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(object),
        )
        .await?;
        debug!(object.name = %name, "Applied object");
        Ok(())
    }
}

async fn prune<K, F>(
    list_api: Api<K>,
    scoped_api: F,
    kind: &'static str,
    selector: &str,
    desired: &HashSet<ObjectKey>,
) -> Result<usize, kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    F: Fn(&str) -> Api<K>,
{
    let existing = list_api.list(&ListParams::default().labels(selector)).await?;
    let stale = stale_objects(
        kind,
        existing
            .items
            .iter()
            .map(|o| (o.namespace().unwrap_or_default(), o.name_any())),
        desired,
    );

    let mut pruned = 0;
    for (namespace, name) in stale {
        match scoped_api(&namespace)
            .delete(&name, &DeleteParams::background())
            .await
        {
            Ok(_) => {
                info!(kind, namespace = %namespace, name = %name, "Pruned object no longer desired");
                pruned += 1;
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e),
        }
    }
    Ok(pruned)
}

/// Existing `(namespace, name)` pairs of `kind` missing from `desired`
fn stale_objects(
    kind: &'static str,
    existing: impl IntoIterator<Item = (String, String)>,
    desired: &HashSet<ObjectKey>,
) -> Vec<(String, String)> {
    existing
        .into_iter()
        .filter(|(namespace, name)| !desired.contains(&(kind, namespace.clone(), name.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_objects_keeps_desired_and_drops_rest() {
        let desired = HashSet::from([
            ("RoleBinding", "dev".to_string(), "klum-alice-deployer-1".to_string()),
            ("ClusterRoleBinding", String::new(), "klum-alice-view-2".to_string()),
        ]);
        let existing = vec![
            ("dev".to_string(), "klum-alice-deployer-1".to_string()),
            ("prod".to_string(), "klum-alice-deployer-1".to_string()),
            ("dev".to_string(), "klum-alice-old-3".to_string()),
        ];

        let stale = stale_objects("RoleBinding", existing, &desired);
        assert_eq!(
            stale,
            vec![
                ("prod".to_string(), "klum-alice-deployer-1".to_string()),
                ("dev".to_string(), "klum-alice-old-3".to_string()),
            ]
        );
    }

    #[test]
    fn test_stale_objects_compares_kind() {
        let desired = HashSet::from([("ServiceAccount", "klum".to_string(), "alice".to_string())]);
        let stale = stale_objects("Secret", vec![("klum".to_string(), "alice".to_string())], &desired);
        assert_eq!(stale.len(), 1);
    }

    #[test]
    fn test_empty_desired_set_prunes_everything() {
        let stale = stale_objects(
            "ClusterRoleBinding",
            vec![(String::new(), "klum-alice-view-2".to_string())],
            &HashSet::new(),
        );
        assert_eq!(stale.len(), 1);
    }
}
