//! # klum Controller
//!
//! Kubernetes Lazy User Manager.
//!
//! 1. **Users** - Each `User` gets a ServiceAccount, its token Secret and the
//!    requested ClusterRoleBindings and RoleBindings
//! 2. **Kubeconfigs** - Once the platform fills the token Secret, a
//!    `Kubeconfig` resource named after the user is written
//! 3. **GitHub sync** - `UserSyncGithub` bindings mirror a Kubeconfig into an
//!    encrypted GitHub Actions secret (only when GitHub credentials are set)

use anyhow::Result;
use clap::Parser;
use klum_controller::config::Args;
use klum_controller::runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let init = runtime::initialize(args).await?;
    runtime::run(init).await;
    Ok(())
}
