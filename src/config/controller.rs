//! # Controller Configuration
//!
//! Runtime tuning loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults from `constants` and can be overridden via
/// environment variables, typically populated from a ConfigMap with `envFrom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Concurrent reconciles per controller
    pub reconcile_concurrency: u16,
    /// Periodic resync of every User (seconds)
    pub resync_interval_secs: u64,
    /// Fibonacci backoff bounds after a failed reconcile (minutes)
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    /// Pause before each GitHub write (milliseconds)
    pub github_throttle_ms: u64,
    /// Timeout of one GitHub HTTP request (seconds)
    pub github_http_timeout_secs: u64,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconcile_concurrency: DEFAULT_RECONCILE_CONCURRENCY,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            github_throttle_ms: DEFAULT_GITHUB_THROTTLE_MS,
            github_http_timeout_secs: DEFAULT_GITHUB_HTTP_TIMEOUT_SECS,
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            reconcile_concurrency: parsed_or(&lookup, "RECONCILE_CONCURRENCY", defaults.reconcile_concurrency)
                .max(1),
            resync_interval_secs: parsed_or(&lookup, "RESYNC_INTERVAL_SECS", defaults.resync_interval_secs),
            backoff_min_minutes: parsed_or(&lookup, "BACKOFF_MIN_MINUTES", defaults.backoff_min_minutes),
            backoff_max_minutes: parsed_or(&lookup, "BACKOFF_MAX_MINUTES", defaults.backoff_max_minutes),
            github_throttle_ms: parsed_or(&lookup, "GITHUB_THROTTLE_MS", defaults.github_throttle_ms),
            github_http_timeout_secs: parsed_or(
                &lookup,
                "GITHUB_HTTP_TIMEOUT_SECS",
                defaults.github_http_timeout_secs,
            ),
            log_format: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_format),
        }
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn github_throttle(&self) -> Duration {
        Duration::from_millis(self.github_throttle_ms)
    }

    pub fn github_http_timeout(&self) -> Duration {
        Duration::from_secs(self.github_http_timeout_secs)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

/// Parse a variable or fall back to `default` when unset or malformed
fn parsed_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
