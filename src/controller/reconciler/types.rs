//! # Types
//!
//! Shared context and error type for the three reconcilers.

use super::secret::CredentialBackend;
use crate::controller::apply::ObjectSetApplier;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::desired_state::GeneratorConfig;
use crate::controller::version::PlatformVersion;
use crate::github::{KubeconfigSync, SyncError};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("GitHub sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Finalizer failed: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ReconcilerError>>),
    #[error("{kind} is missing {field}")]
    MissingObjectKey {
        kind: &'static str,
        field: &'static str,
    },
}

/// How generated Kubeconfigs reach the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigSettings {
    /// Name given to the cluster and context entries
    pub context_name: String,
    /// API server URL written into every Kubeconfig
    pub server: String,
    /// Base64 CA bundle; empty means take `ca.crt` from the token Secret
    pub ca: String,
}

/// Backoff state for a specific object
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Failure history per object, keyed by [`backoff_key`]
///
/// An entry lives only while its object keeps failing.
#[derive(Debug, Default)]
pub struct BackoffTable {
    states: Mutex<HashMap<String, BackoffState>>,
}

impl BackoffTable {
    /// Count one more failure; returns the retry delay in seconds and the error count
    ///
    /// `None` when the table lock is poisoned.
    pub fn record_failure(
        &self,
        key: String,
        min_minutes: u64,
        max_minutes: u64,
    ) -> Option<(u64, u32)> {
        let mut states = self.states.lock().ok()?;
        let state = states
            .entry(key)
            .or_insert_with(|| BackoffState::new(min_minutes, max_minutes));
        state.increment_error();
        Some((state.backoff.next_backoff_seconds(), state.error_count))
    }

    /// Drop the history of an object that reconciled cleanly or was cleaned up
    pub fn clear(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Context handed to every reconcile and error-policy call
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub generator: GeneratorConfig,
    pub version: PlatformVersion,
    pub kubeconfig: KubeconfigSettings,
    pub applier: ObjectSetApplier,
    pub backend: Arc<dyn CredentialBackend>,
    /// Absent when no GitHub credentials are configured
    pub sync: Option<Arc<dyn KubeconfigSync>>,
    pub resync_interval: Duration,
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    pub backoff_states: Arc<BackoffTable>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("generator", &self.generator)
            .field("version", &self.version)
            .field("kubeconfig", &self.kubeconfig)
            .field("github_sync", &self.sync.is_some())
            .finish_non_exhaustive()
    }
}

/// Key used for per-object backoff tracking
#[must_use]
pub fn backoff_key(kind: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{kind}/{ns}/{name}"),
        None => format!("{kind}/{name}"),
    }
}

/// True for a 404 from the API server
#[must_use]
pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}
