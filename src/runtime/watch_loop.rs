//! # Watch Loop
//!
//! Runs the User, token Secret and UserSyncGithub controllers side by side
//! until SIGINT/SIGTERM.

use super::error_policy::handle_reconciliation_error;
use super::initialization::InitializationResult;
use crate::constants::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, SERVICE_ACCOUNT_TOKEN_TYPE};
use crate::controller::reconciler::{
    reconcile_secret, reconcile_user, reconcile_user_sync, ReconcilerError,
};
use crate::crd::{Kubeconfig, User, UserSyncGithub};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use tracing::{debug, info, warn};

type ReconcileResult<K> =
    Result<(ObjectRef<K>, Action), controller::Error<ReconcilerError, watcher::Error>>;

/// Drain a controller stream, logging each reconcile result
async fn drain<K, S>(name: &'static str, stream: S)
where
    K: kube::Resource,
    S: Stream<Item = ReconcileResult<K>>,
{
    stream
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(controller = name, object = %object.name, "Reconciled"),
                Err(e) => warn!(controller = name, "Reconcile failed: {}", e),
            }
        })
        .await;
    info!(controller = name, "Controller stopped");
}

/// Run every controller until shutdown
pub async fn run(init: InitializationResult) {
    let InitializationResult {
        client,
        reconciler: ctx,
        server_state,
        controller_config,
    } = init;
    let runtime_config =
        || controller::Config::default().concurrency(controller_config.reconcile_concurrency);
    let namespace = ctx.generator.namespace.clone();
    let owned = || watcher::Config::default().labels(&format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}"));

    let mut controllers: Vec<BoxFuture<'static, ()>> = Vec::new();

    let users = Controller::new(Api::<User>::all(client.clone()), watcher::Config::default())
        .with_config(runtime_config())
        .owns(Api::<ServiceAccount>::namespaced(client.clone(), &namespace), owned())
        .owns(Api::<Secret>::namespaced(client.clone(), &namespace), owned())
        .owns(Api::<ClusterRoleBinding>::all(client.clone()), owned())
        .owns(Api::<RoleBinding>::all(client.clone()), owned())
        .shutdown_on_signal()
        .run(reconcile_user, handle_reconciliation_error, ctx.clone());
    controllers.push(drain("user", users).boxed());

    let token_secrets = Controller::new(
        Api::<Secret>::namespaced(client.clone(), &namespace),
        watcher::Config::default().fields(&format!("type={SERVICE_ACCOUNT_TOKEN_TYPE}")),
    )
    .with_config(runtime_config())
    .shutdown_on_signal()
    .run(reconcile_secret, handle_reconciliation_error, ctx.clone());
    controllers.push(drain("secret", token_secrets).boxed());

    if ctx.sync.is_some() {
        let sync = Controller::new(
            Api::<UserSyncGithub>::all(client.clone()),
            watcher::Config::default(),
        )
        .with_config(runtime_config());
        let bindings = sync.store();
        let sync = sync
            .watches(
                Api::<Kubeconfig>::all(client.clone()),
                watcher::Config::default(),
                move |kubeconfig: Kubeconfig| {
                    let user = kubeconfig.name_any();
                    bindings
                        .state()
                        .into_iter()
                        .filter(|binding| binding.spec.user == user)
                        .map(|binding| ObjectRef::from_obj(binding.as_ref()))
                        .collect::<Vec<_>>()
                },
            )
            .shutdown_on_signal()
            .run(reconcile_user_sync, handle_reconciliation_error, ctx.clone());
        controllers.push(drain("user-sync-github", sync).boxed());
    } else {
        info!("GitHub sync controller not started");
    }

    server_state.set_ready(true);
    info!(controllers = controllers.len(), "Controllers running");

    futures::future::join_all(controllers).await;

    server_state.set_ready(false);
    info!("All controllers stopped");
}
