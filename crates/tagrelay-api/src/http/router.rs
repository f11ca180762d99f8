//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{any, get, post},
};
use tagrelay_telemetry::build_sha;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::{require_actor, require_jobservice_secret};
use crate::http::constants::{HEADER_API_KEY, HEADER_REQUEST_ID, PROXY_MOUNT};
use crate::http::health::{health, health_full, metrics};
use crate::http::jobs::list_jobs;
use crate::http::notifications::job_status_changed;
use crate::http::policies::{create_policy, delete_policy, get_policy, list_policies, update_policy};
use crate::http::replication::{trigger_policy, trigger_single_pull};
use crate::http::telemetry::RouteMetricsLayer;
use crate::proxy::remote_pull;
use crate::state::{ApiDependencies, ApiState};

/// Axum router wrapper that hosts the tagrelay API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the API server from its collaborators.
    #[must_use]
    pub fn new(deps: ApiDependencies) -> Self {
        Self::with_state(Arc::new(ApiState::new(deps)))
    }

    pub(crate) fn with_state(state: Arc<ApiState>) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                CONTENT_TYPE,
                AUTHORIZATION,
                HeaderName::from_static(HEADER_API_KEY),
            ]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(tagrelay_telemetry::set_request_id_layer())
            .layer(tagrelay_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(RouteMetricsLayer::new(state.telemetry.clone()));

        let router = Self::build_router(&state)
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn build_router(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        Self::public_routes()
            .merge(Self::api_routes(state))
            .merge(Self::service_routes(state))
            .merge(Self::proxy_routes())
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/health/full", get(health_full))
            .route("/metrics", get(metrics))
    }

    fn api_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_api = middleware::from_fn_with_state(state.clone(), require_actor);

        Router::new()
            .route("/api/replications", post(trigger_policy))
            .route("/api/replications/pull/single", post(trigger_single_pull))
            .route(
                "/api/policies/replication",
                get(list_policies).post(create_policy),
            )
            .route(
                "/api/policies/replication/{id}",
                get(get_policy).put(update_policy).delete(delete_policy),
            )
            .route("/api/jobs/replication", get(list_jobs))
            .route_layer(require_api)
    }

    fn service_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_jobservice =
            middleware::from_fn_with_state(state.clone(), require_jobservice_secret);

        Router::new()
            .route(
                "/service/notifications/jobs/replication/{id}",
                post(job_status_changed),
            )
            .route_layer(require_jobservice)
    }

    fn proxy_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route(PROXY_MOUNT, any(remote_pull))
            .route(&format!("{PROXY_MOUNT}/{{*path}}"), any(remote_pull))
    }

    /// Serve the API on `addr` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(%addr, "starting api listener");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use tagrelay_core::{JobStatus, NewRepJob, Operation};
    use tower::ServiceExt;

    use crate::test_harness::{ADMIN, ADMIN_SECRET, Harness, JOBSERVICE_SECRET};

    async fn send(harness: &Harness, request: Request<Body>) -> axum::response::Response {
        ApiServer::with_state(harness.state())
            .router()
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router")
    }

    #[tokio::test]
    async fn health_is_public_and_tagged_with_request_id() {
        let harness = Harness::new();
        let response = send(
            &harness,
            Request::get("/health").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(HEADER_REQUEST_ID));
    }

    #[tokio::test]
    async fn api_routes_require_credentials() {
        let harness = Harness::new();
        let response = send(
            &harness,
            Request::post("/api/replications")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"policy_id":1}"#))
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_trigger_reaches_handler() {
        let harness = Harness::new();
        let response = send(
            &harness,
            Request::post("/api/replications")
                .header(CONTENT_TYPE, "application/json")
                .header(HEADER_API_KEY, format!("{ADMIN}:{ADMIN_SECRET}"))
                .body(Body::from(r#"{"policy_id":42}"#))
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn job_callbacks_require_service_secret() {
        let harness = Harness::new();
        let job_id = harness.ledger.seed(
            NewRepJob {
                policy_id: 1,
                repository: "library/alpine".into(),
                tags: vec!["3.19".into()],
                operation: Operation::Transfer,
            },
            JobStatus::Pending,
        );
        let uri = format!("/service/notifications/jobs/replication/{job_id}");

        let rejected = send(
            &harness,
            Request::post(uri.as_str())
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, "Relay-Secret wrong")
                .body(Body::from(r#"{"status":"running"}"#))
                .expect("request"),
        )
        .await;
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

        let accepted = send(
            &harness,
            Request::post(uri.as_str())
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("Relay-Secret {JOBSERVICE_SECRET}"))
                .body(Body::from(r#"{"status":"running"}"#))
                .expect("request"),
        )
        .await;
        assert_eq!(accepted.status(), StatusCode::OK);
        assert_eq!(harness.ledger.jobs()[0].status, JobStatus::Running);
    }

    #[tokio::test]
    async fn disabled_proxy_answers_service_unavailable() {
        let harness = Harness::new();
        let response = send(
            &harness,
            Request::get("/remote-pull/v2/")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn requests_are_counted_per_route() {
        let harness = Harness::new();
        let _ = send(
            &harness,
            Request::get("/health").body(Body::empty()).expect("request"),
        )
        .await;
        let response = send(
            &harness,
            Request::get("/metrics").body(Body::empty()).expect("request"),
        )
        .await;
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        let line = text
            .lines()
            .find(|line| line.starts_with("http_requests_total") && line.contains(r#"route="/health""#))
            .expect("health counter");
        assert!(line.ends_with(" 1"));
    }
}
