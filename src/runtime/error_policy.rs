//! # Error Policy
//!
//! Requeue failed reconciles with a per-object Fibonacci backoff.

use crate::controller::reconciler::types::backoff_key;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Fallback delay when the backoff table cannot be locked
const FALLBACK_BACKOFF_SECS: u64 = 60;

/// Shared by the User, Secret and UserSyncGithub controllers
///
/// Each object keeps its own error count, so one failing object never slows
/// the retries of another.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.kind = %kind,
        resource.name = %name,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}: {:?}", kind, name, error);
    metrics::increment_reconciliation_errors();

    let key = backoff_key(&kind, namespace.as_deref(), &name);
    let (backoff_seconds, error_count) = match ctx.backoff_states.record_failure(
        key,
        ctx.backoff_min_minutes,
        ctx.backoff_max_minutes,
    ) {
        Some(recorded) => recorded,
        None => {
            warn!("Backoff table lock poisoned, using default backoff");
            (FALLBACK_BACKOFF_SECS, 0)
        }
    };

    info!(
        "Retrying in {}s (error count: {})",
        backoff_seconds, error_count
    );
    Action::requeue(Duration::from_secs(backoff_seconds))
}
