//! Secure pull proxy: forwards registry pull traffic to one upstream under a
//! substituted service credential.
//!
//! Requests pass through the stages in `pipeline.rs` before `transport.rs`
//! relays them; a proxy without a usable upstream answers 503.

pub(crate) mod pipeline;
pub mod rewrite;
pub(crate) mod transport;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
};
use reqwest::Client;
use tagrelay_config::RemotePullConfig;
use tagrelay_telemetry::PullOutcome;
use tracing::{info, warn};
use url::Url;

use crate::http::auth::resolve_actor;
use crate::http::errors::ApiError;
use crate::proxy::pipeline::{ProxyExchange, StageContext, run_request_stages, run_response_stages};
use crate::state::ApiState;

/// Pull proxy state resolved once at startup.
pub enum PullProxy {
    /// Upstream resolved; requests are forwarded.
    Ready(ProxyUpstream),
    /// No usable upstream; requests are answered with 503.
    Disabled {
        /// Why the proxy could not be initialised.
        reason: String,
    },
}

/// Resolved upstream registry and the service credential presented to it.
pub struct ProxyUpstream {
    base: Url,
    client: Client,
    secret: String,
    secret_prefix: String,
}

impl ProxyUpstream {
    /// Upstream base URL.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn credential(&self, username: &str) -> String {
        format!("{}{}@{username}", self.secret_prefix, self.secret)
    }
}

impl PullProxy {
    /// Resolve the proxy from configuration. Unusable settings yield
    /// [`PullProxy::Disabled`] instead of an error.
    #[must_use]
    pub fn from_config(config: &RemotePullConfig) -> Self {
        let Some(raw) = config.upstream_url.as_deref() else {
            return Self::disabled("remote pull upstream is not configured".to_string());
        };
        let base = match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                return Self::disabled(format!("unsupported upstream scheme '{}'", url.scheme()));
            }
            Err(err) => return Self::disabled(format!("invalid upstream url: {err}")),
        };
        let client = match Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .redirect(reqwest::redirect::Policy::none())
            .build()
        {
            Ok(client) => client,
            Err(err) => return Self::disabled(format!("failed to build upstream client: {err}")),
        };
        if config.skip_tls_verify {
            warn!(upstream = %base, "remote pull skips upstream certificate validation");
        }
        info!(upstream = %base, "remote pull proxy ready");
        Self::Ready(ProxyUpstream {
            base,
            client,
            secret: config.secret.clone(),
            secret_prefix: config.secret_prefix.clone(),
        })
    }

    fn disabled(reason: String) -> Self {
        warn!(reason = %reason, "remote pull proxy disabled");
        Self::Disabled { reason }
    }

    /// Whether requests are forwarded.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Handler mounted under `/remote-pull`.
pub(crate) async fn remote_pull(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
) -> Response {
    let upstream = match &state.proxy {
        PullProxy::Ready(upstream) => upstream,
        PullProxy::Disabled { reason } => {
            state.telemetry.inc_remote_pull(PullOutcome::Unavailable);
            return ApiError::service_unavailable(format!("remote pull is disabled: {reason}"))
                .into_response();
        }
    };

    let (parts, body) = req.into_parts();
    let mut exchange = ProxyExchange::from_parts(parts);
    exchange.verified =
        Some(resolve_actor(Arc::clone(&state.config), exchange.headers.clone()).await);
    let ctx = StageContext { upstream };
    if let Some(rejection) = run_request_stages(&mut exchange, &ctx) {
        state.telemetry.inc_remote_pull(PullOutcome::Rejected);
        return rejection;
    }
    let Some(target) = exchange.target.take() else {
        return ApiError::internal("proxy target was not resolved").into_response();
    };

    let identity = exchange.identity.unwrap_or_default();
    match transport::forward(&upstream.client, exchange.method, exchange.headers, target, body).await
    {
        Ok(mut response) => {
            run_response_stages(response.headers_mut());
            state.telemetry.inc_remote_pull(PullOutcome::Forwarded);
            info!(
                username = %identity,
                path = %exchange.incoming_path,
                status = response.status().as_u16(),
                "remote pull forwarded"
            );
            response
        }
        Err(err) => {
            state.telemetry.inc_remote_pull(PullOutcome::UpstreamFailed);
            warn!(error = %err, username = %identity, "remote pull upstream request failed");
            ApiError::bad_gateway("upstream registry request failed").into_response()
        }
    }
}
