//! Per-route request counters.

use std::task::{Context, Poll};

use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tagrelay_telemetry::Metrics;
use tower::{Layer, Service};

const UNMATCHED_ROUTE: &str = "unmatched";

/// Counts responses by route template and status code.
#[derive(Clone)]
pub(crate) struct RouteMetricsLayer {
    metrics: Metrics,
}

impl RouteMetricsLayer {
    pub(crate) const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for RouteMetricsLayer {
    type Service = RouteMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteMetrics {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RouteMetrics<S> {
    inner: S,
    metrics: Metrics,
}

/// Label a request by its route template; proxied paths are unbounded.
fn route_label<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_owned(), |matched| matched.as_str().to_owned())
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RouteMetrics<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let route = route_label(&request);
        let metrics = self.metrics.clone();
        self.inner
            .call(request)
            .map(move |result| {
                if let Ok(response) = &result {
                    metrics.inc_http_request(&route, response.status().as_u16());
                }
                result
            })
            .boxed()
    }
}
