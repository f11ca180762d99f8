//! Health and diagnostics endpoints.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use tagrelay_telemetry::build_sha;
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::models::{FullHealthResponse, HealthMetrics, HealthResponse, RemotePullHealth};
use crate::proxy::PullProxy;
use crate::state::ApiState;

const COMPONENT_DATABASE: &str = "database";
const COMPONENT_REMOTE_PULL: &str = "remote_pull";

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        build: build_sha().to_string(),
    })
}

pub(crate) async fn health_full(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FullHealthResponse>, ApiError> {
    if let Err(err) = state.ledger.ping().await {
        state.add_degraded_component(COMPONENT_DATABASE);
        warn!(error = %err, "full health check failed to reach database");
        return Err(ApiError::service_unavailable(
            "database is currently unavailable",
        ));
    }
    state.remove_degraded_component(COMPONENT_DATABASE);

    let remote_pull = match &state.proxy {
        PullProxy::Ready(_) => {
            state.remove_degraded_component(COMPONENT_REMOTE_PULL);
            RemotePullHealth {
                ready: true,
                reason: None,
            }
        }
        PullProxy::Disabled { reason } => {
            state.add_degraded_component(COMPONENT_REMOTE_PULL);
            RemotePullHealth {
                ready: false,
                reason: Some(reason.clone()),
            }
        }
    };

    let snapshot = state.telemetry.snapshot();
    let degraded = state.current_health_degraded();
    let status = if degraded.is_empty() { "ok" } else { "degraded" };
    Ok(Json(FullHealthResponse {
        status: status.to_string(),
        build: build_sha().to_string(),
        degraded,
        remote_pull,
        metrics: HealthMetrics {
            replication_jobs_submitted_total: snapshot.replication_jobs_submitted_total,
            replication_submit_failures_total: snapshot.replication_submit_failures_total,
            remote_pull_forwarded_total: snapshot.remote_pull_forwarded_total,
        },
    }))
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let body = state.telemetry.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal("failed to render metrics")
    })?;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .map_err(|err| {
            error!(error = %err, "failed to build metrics response");
            ApiError::internal("failed to build metrics response")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    use crate::test_harness::Harness;

    #[tokio::test]
    async fn liveness_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn full_health_reports_disabled_proxy_as_degraded() {
        let harness = Harness::new();
        let Json(body) = health_full(State(harness.state()))
            .await
            .expect("healthy ledger");

        assert_eq!(body.status, "degraded");
        assert_eq!(body.degraded, vec![COMPONENT_REMOTE_PULL.to_string()]);
        assert!(!body.remote_pull.ready);
        assert!(body.remote_pull.reason.is_some());
    }

    #[tokio::test]
    async fn full_health_is_ok_with_ready_proxy() {
        let harness = Harness::with_upstream("http://registry.example/v2");
        let Json(body) = health_full(State(harness.state()))
            .await
            .expect("healthy ledger");

        assert_eq!(body.status, "ok");
        assert!(body.degraded.is_empty());
        assert!(body.remote_pull.ready);
    }

    #[tokio::test]
    async fn full_health_fails_when_ledger_is_unreachable() {
        let harness = Harness::new();
        harness.ledger.fail_ping();
        let state = harness.state();

        let err = health_full(State(state.clone()))
            .await
            .expect_err("ledger down");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(
            state
                .current_health_degraded()
                .contains(&COMPONENT_DATABASE.to_string())
        );
    }

    #[tokio::test]
    async fn metrics_renders_prometheus_text() {
        let harness = Harness::new();
        harness.metrics.inc_job_submitted();
        let response = metrics(State(harness.state())).await.expect("metrics");
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(text.contains("replication_jobs_submitted_total 1"));
    }
}
