//! # Reconciler
//!
//! Reconciliation logic for the three watched kinds.
//!
//! - `user.rs` - `User` → ServiceAccount, token Secret and RBAC bindings
//! - `secret.rs` - token Secret → `Kubeconfig`
//! - `user_sync.rs` - `UserSyncGithub` → GitHub encrypted secret
//! - `types.rs` - Shared context, errors and backoff state

pub mod secret;
pub mod types;
pub mod user;
pub mod user_sync;

pub use secret::{
    build_kubeconfig, handle_secret, on_secret_change, on_secret_removed, reconcile_secret,
    resolve_user_for_secret, CredentialBackend, KubeApiBackend, SecretOutcome,
};
pub use types::{BackoffState, BackoffTable, KubeconfigSettings, Reconciler, ReconcilerError};
pub use user::reconcile_user;
pub use user_sync::{delete_binding, reconcile_user_sync, upload_binding};
