//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters relevant to replication submissions and the pull proxy.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome label recorded for each pull proxy exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The exchange was forwarded and a response relayed.
    Forwarded,
    /// The request was rejected before forwarding (missing session).
    Rejected,
    /// The proxy is disabled or not initialised.
    Unavailable,
    /// The upstream could not be reached.
    UpstreamFailed,
}

impl PullOutcome {
    /// Label value used in the `remote_pull_requests_total` counter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forwarded => "forwarded",
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
            Self::UpstreamFailed => "upstream_failed",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    replication_jobs_submitted_total: IntCounter,
    replication_submit_failures_total: IntCounter,
    remote_pull_requests_total: IntCounterVec,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Transfer jobs accepted by the job service.
    pub replication_jobs_submitted_total: u64,
    /// Transfer jobs that failed to submit or attach.
    pub replication_submit_failures_total: u64,
    /// Pull proxy exchanges that reached the upstream.
    pub remote_pull_forwarded_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Domain events emitted by type",
            &["type"],
        )?;
        let replication_jobs_submitted_total = counter(
            "replication_jobs_submitted_total",
            "Transfer jobs accepted by the job service",
        )?;
        let replication_submit_failures_total = counter(
            "replication_submit_failures_total",
            "Transfer jobs that failed to submit",
        )?;
        let remote_pull_requests_total = counter_vec(
            "remote_pull_requests_total",
            "Pull proxy exchanges by outcome",
            &["outcome"],
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(
            &registry,
            "replication_jobs_submitted_total",
            &replication_jobs_submitted_total,
        )?;
        register(
            &registry,
            "replication_submit_failures_total",
            &replication_submit_failures_total,
        )?;
        register(
            &registry,
            "remote_pull_requests_total",
            &remote_pull_requests_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                replication_jobs_submitted_total,
                replication_submit_failures_total,
                remote_pull_requests_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Record a transfer job accepted by the job service.
    pub fn inc_job_submitted(&self) {
        self.inner.replication_jobs_submitted_total.inc();
    }

    /// Record a transfer job that could not be submitted.
    pub fn inc_submit_failure(&self) {
        self.inner.replication_submit_failures_total.inc();
    }

    /// Record the outcome of a pull proxy exchange.
    pub fn inc_remote_pull(&self, outcome: PullOutcome) {
        self.inner
            .remote_pull_requests_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the replication counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            replication_jobs_submitted_total: self.inner.replication_jobs_submitted_total.get(),
            replication_submit_failures_total: self.inner.replication_submit_failures_total.get(),
            remote_pull_forwarded_total: self
                .inner
                .remote_pull_requests_total
                .with_label_values(&[PullOutcome::Forwarded.as_str()])
                .get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.inc_event("replication_requested");
        metrics.inc_job_submitted();
        metrics.inc_job_submitted();
        metrics.inc_submit_failure();
        metrics.inc_remote_pull(PullOutcome::Forwarded);
        metrics.inc_remote_pull(PullOutcome::Rejected);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.replication_jobs_submitted_total, 2);
        assert_eq!(snapshot.replication_submit_failures_total, 1);
        assert_eq!(snapshot.remote_pull_forwarded_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("remote_pull_requests_total{outcome=\"rejected\"} 1"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_job_submitted();
        assert_eq!(second.snapshot().replication_jobs_submitted_total, 0);
        Ok(())
    }

    #[test]
    fn snapshot_serialises_for_health_payloads() -> Result<()> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot()).expect("snapshot serialises");
        assert_eq!(value["replication_jobs_submitted_total"], 0);
        Ok(())
    }
}
