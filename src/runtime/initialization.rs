//! # Initialization
//!
//! Controller start-up: rustls setup, tracing, metrics, server startup,
//! Kubernetes client, platform version probe and GitHub sync wiring.
//!
//! Failures here are fatal and surface from `main`.

use crate::config::{Args, ControllerConfig, GithubConfig};
use crate::controller::apply::ObjectSetApplier;
use crate::controller::desired_state::GeneratorConfig;
use crate::controller::reconciler::{KubeApiBackend, KubeconfigSettings, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::controller::version::PlatformVersion;
use crate::github::{GithubConnector, KubeconfigSync, SyncEngine};
use crate::observability;
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig as KubeconfigFile};
use kube::Client;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

fn init_tracing(config: &ControllerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "klum_controller=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .context("Failed to create in-cluster Kubernetes client");
    };
    let file = KubeconfigFile::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(file, &KubeConfigOptions::default())
        .await
        .with_context(|| format!("Failed to load kubeconfig {}", path.display()))?;
    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Initialize the controller runtime
pub async fn initialize(args: Args) -> Result<InitializationResult> {
    // Installing twice only fails when a provider is already present
    let _ = rustls::crypto::ring::default_provider().install_default();

    let controller_config = ControllerConfig::from_env();
    init_tracing(&controller_config);

    info!("Starting klum controller");
    info!(
        "Build info: version={}, datetime={}, git_hash={}",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let metrics_port = args.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(metrics_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = kube_client(args.kubeconfig.as_deref()).await?;

    let server_version = client
        .apiserver_version()
        .await
        .context("Failed to query the API server version")?;
    let version = PlatformVersion::parse(&server_version.minor)
        .context("Failed to parse the API server version")?;
    info!(
        major = %server_version.major,
        minor = version.minor,
        manual_token_secrets = version.requires_manual_token_secret(),
        "Detected Kubernetes version"
    );

    let sync = match GithubConfig::from_args(&args.github)? {
        Some(github) => {
            info!(api_url = %github.api_url, "GitHub sync enabled");
            let connector = GithubConnector::new(github, controller_config.github_http_timeout())?;
            let engine: Arc<dyn KubeconfigSync> = Arc::new(SyncEngine::new(
                connector,
                controller_config.github_throttle(),
            ));
            Some(engine)
        }
        None => {
            info!("GitHub sync disabled, no credentials configured");
            None
        }
    };

    let reconciler = Arc::new(Reconciler {
        client: client.clone(),
        generator: GeneratorConfig {
            namespace: args.namespace.clone(),
            default_cluster_role: args.default_cluster_role.clone(),
        },
        version,
        kubeconfig: KubeconfigSettings {
            context_name: args.context_name.clone(),
            server: args.server.clone(),
            ca: args.ca.clone(),
        },
        applier: ObjectSetApplier::new(client.clone(), args.namespace.clone()),
        backend: Arc::new(KubeApiBackend::new(client.clone())),
        sync,
        resync_interval: controller_config.resync_interval(),
        backoff_min_minutes: controller_config.backoff_min_minutes,
        backoff_max_minutes: controller_config.backoff_max_minutes,
        backoff_states: Arc::default(),
    });

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        controller_config,
    })
}
