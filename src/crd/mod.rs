//! # Custom Resource Definitions
//!
//! CRD types for the klum controller, all in `klum.cattle.io/v1alpha1` and
//! cluster-scoped.
//!
//! ## Module Structure
//!
//! - `user.rs` - The `User` identity declaration
//! - `kubeconfig.rs` - The materialized `Kubeconfig`
//! - `user_sync.rs` - `UserSyncGithub` external mirror bindings
//! - `status.rs` - User status and condition helpers

mod kubeconfig;
mod status;
mod user;
mod user_sync;

// Re-export all public types
pub use kubeconfig::{
    AuthInfo, Cluster, Context, Kubeconfig, KubeconfigSpec, NamedAuthInfo, NamedCluster,
    NamedContext,
};
pub use status::{remove_condition, set_condition, Condition, UserStatus};
pub use user::{NamespaceRole, User, UserSpec};
pub use user_sync::{GithubSyncSpec, InvalidDestination, UserSyncGithub, UserSyncGithubSpec};
