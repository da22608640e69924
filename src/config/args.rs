//! # Process Arguments
//!
//! Command-line flags, each with an environment variable fallback so the
//! controller can be configured entirely from a Deployment manifest.

use crate::constants::DEFAULT_METRICS_PORT;
use clap::{Args as ClapArgs, Parser};
use std::path::PathBuf;

/// Kubernetes Lazy User Manager
#[derive(Debug, Clone, Parser)]
#[command(
    name = "klum-controller",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), " ", env!("BUILD_DATETIME"), ")"),
    about = "Reconciles User resources into ServiceAccounts, RBAC bindings and downloadable Kubeconfigs",
    long_about = None
)]
pub struct Args {
    /// Kubeconfig used to reach the cluster (in-cluster config when unset)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace for ServiceAccounts and token Secrets
    #[arg(long, env = "NAMESPACE", default_value = "klum")]
    pub namespace: String,

    /// Context, cluster and kubeconfig entry name written into Kubeconfigs
    #[arg(long, env = "CONTEXT_NAME", default_value = "default")]
    pub context_name: String,

    /// API server address written into Kubeconfigs
    #[arg(long, env = "SERVER_NAME", default_value = "https://localhost:6443")]
    pub server: String,

    /// Base64 CA bundle written into Kubeconfigs (taken from the token Secret when empty)
    #[arg(long, env = "CA", default_value = "")]
    pub ca: String,

    /// Cluster role bound to users that list no roles (empty disables)
    #[arg(long, env = "DEFAULT_CLUSTER_ROLE", default_value = "cluster-admin")]
    pub default_cluster_role: String,

    /// Port for /metrics, /healthz and /readyz
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    #[command(flatten)]
    pub github: GithubArgs,
}

/// Credentials for the optional GitHub secret sync
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct GithubArgs {
    /// GitHub Enterprise URL; public GitHub when unset
    #[arg(long = "github-url", env = "GITHUB_URL")]
    pub url: Option<String>,

    /// Personal access token
    #[arg(long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub App id, used together with a private key file
    #[arg(long = "github-app-id", env = "GITHUB_APP_ID")]
    pub app_id: Option<u64>,

    /// PEM private key of the GitHub App
    #[arg(long = "github-private-key-file", env = "GITHUB_PRIVATE_KEY_FILE")]
    pub private_key_file: Option<PathBuf>,
}
