//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `klum_reconciliations_total{kind}` - Reconciliations per controller kind
//! - `klum_errors_total` - Failed reconciliations across all controllers
//! - `klum_reconciliation_duration_seconds` - Duration of reconciliations
//! - `klum_kubeconfigs_applied_total` - Kubeconfigs written from token Secrets
//! - `klum_github_uploads_total{result}` - GitHub secret uploads by outcome
//! - `klum_github_deletes_total` - GitHub secrets removed

use anyhow::Result;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("klum_reconciliations_total", "Total number of reconciliations"),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("klum_errors_total", "Total number of failed reconciliations")
        .expect("Failed to create ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "klum_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static KUBECONFIGS_APPLIED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "klum_kubeconfigs_applied_total",
        "Total number of Kubeconfigs applied from token Secrets",
    )
    .expect("Failed to create KUBECONFIGS_APPLIED_TOTAL metric - this should never happen")
});

static GITHUB_UPLOADS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "klum_github_uploads_total",
            "Total number of Kubeconfig uploads to GitHub secrets",
        ),
        &["result"],
    )
    .expect("Failed to create GITHUB_UPLOADS_TOTAL metric - this should never happen")
});

static GITHUB_DELETES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "klum_github_deletes_total",
        "Total number of GitHub secrets deleted",
    )
    .expect("Failed to create GITHUB_DELETES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(KUBECONFIGS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GITHUB_UPLOADS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GITHUB_DELETES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors() {
    ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_kubeconfigs_applied() {
    KUBECONFIGS_APPLIED_TOTAL.inc();
}

pub fn increment_github_uploads(result: &str) {
    GITHUB_UPLOADS_TOTAL.with_label_values(&[result]).inc();
}

pub fn increment_github_deletes() {
    GITHUB_DELETES_TOTAL.inc();
}

/// Registry contents in the Prometheus text exposition format
pub fn encode_text() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_text_output() {
        // Registration may already have happened in another test of this binary
        let _ = register_metrics();
        increment_reconciliations("User");
        increment_github_uploads("success");

        let text = String::from_utf8(encode_text().unwrap()).unwrap();
        assert!(text.contains("klum_reconciliations_total{kind=\"User\"}"));
        assert!(text.contains("klum_github_uploads_total{result=\"success\"}"));
    }
}
