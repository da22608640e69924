//! # User Reconciliation
//!
//! Generate the desired object set, converge the cluster onto it, then
//! record the resulting conditions. The status is only written when the
//! conditions actually changed.

use super::types::{backoff_key, Reconciler, ReconcilerError};
use crate::controller::desired_state::generate;
use crate::controller::naming::label_value;
use crate::crd::User;
use crate::observability::metrics;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

pub async fn reconcile_user(user: Arc<User>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = user.name_any();
    let span = info_span!("reconcile", resource.kind = "User", resource.name = %name);

    async move {
        metrics::increment_reconciliations("User");

        let desired = generate(&user, &ctx.generator, ctx.version);
        if !desired.skipped_roles.is_empty() {
            info!(skipped = ?desired.skipped_roles, "Skipping malformed role entries");
        }

        let report = ctx.applier.apply(&label_value(&name), &desired.objects).await?;
        debug!(applied = report.applied, pruned = report.pruned, "Object set converged");

        if user.status.as_ref() != Some(&desired.status) {
            let api: Api<User> = Api::all(ctx.client.clone());
            let patch = serde_json::json!({ "status": desired.status });
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            info!(ready = desired.is_ready(), "Updated user status");
        }

        ctx.backoff_states.clear(&backoff_key("User", None, &name));
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        Ok::<_, ReconcilerError>(Action::requeue(ctx.resync_interval))
    }
    .instrument(span)
    .await
}
