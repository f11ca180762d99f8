//! Ordered request and response stages applied to every proxied exchange.

use axum::{
    http::{
        HeaderMap, HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONNECTION, HOST, SET_COOKIE, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use tracing::{debug, error};
use url::Url;

use crate::http::auth::Actor;
use crate::http::constants::{HEADER_API_KEY, HEADER_REMOTE_PULL};
use crate::http::errors::ApiError;
use crate::proxy::ProxyUpstream;
use crate::proxy::rewrite::{incoming_path, target_url};

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];
const BASIC_CHALLENGE: &str = "Basic realm=\"tagrelay\"";

/// Typed state threaded through the request stages.
pub(crate) struct ProxyExchange {
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) incoming_path: String,
    pub(crate) query: Option<String>,
    /// Credential check resolved before the stages run.
    pub(crate) verified: Option<Result<Actor, ApiError>>,
    pub(crate) session: Option<Actor>,
    pub(crate) identity: Option<String>,
    pub(crate) target: Option<Url>,
}

impl ProxyExchange {
    pub(crate) fn from_parts(parts: Parts) -> Self {
        Self {
            incoming_path: incoming_path(parts.uri.path()).to_string(),
            query: parts.uri.query().map(str::to_string),
            method: parts.method,
            headers: parts.headers,
            verified: None,
            session: None,
            identity: None,
            target: None,
        }
    }
}

/// Read-only inputs shared by the stages.
pub(crate) struct StageContext<'a> {
    pub(crate) upstream: &'a ProxyUpstream,
}

pub(crate) enum StageOutcome {
    Continue,
    ShortCircuit(Response),
}

type RequestStage = fn(&mut ProxyExchange, &StageContext<'_>) -> StageOutcome;
type ResponseStage = fn(&mut HeaderMap);

pub(crate) const REQUEST_STAGES: [(&str, RequestStage); 5] = [
    ("require_session", require_session),
    ("embed_identity", embed_identity),
    ("mark_remote_pull", mark_remote_pull),
    ("substitute_credential", substitute_credential),
    ("rewrite_target", rewrite_target),
];

pub(crate) const RESPONSE_STAGES: [(&str, ResponseStage); 2] = [
    ("strip_hop_by_hop", strip_hop_by_hop),
    ("scrub_set_cookie", scrub_set_cookie),
];

/// Run the request stages in order; the first short-circuit wins.
pub(crate) fn run_request_stages(
    exchange: &mut ProxyExchange,
    ctx: &StageContext<'_>,
) -> Option<Response> {
    for (name, stage) in REQUEST_STAGES {
        if let StageOutcome::ShortCircuit(response) = stage(exchange, ctx) {
            debug!(
                stage = name,
                status = response.status().as_u16(),
                "pull proxy request rejected"
            );
            return Some(response);
        }
    }
    None
}

pub(crate) fn run_response_stages(headers: &mut HeaderMap) {
    for (_, stage) in RESPONSE_STAGES {
        stage(headers);
    }
}

fn require_session(exchange: &mut ProxyExchange, _ctx: &StageContext<'_>) -> StageOutcome {
    let verified = exchange
        .verified
        .take()
        .unwrap_or_else(|| Err(ApiError::unauthorized("missing credentials")));
    match verified {
        Ok(actor) => {
            exchange.session = Some(actor);
            StageOutcome::Continue
        }
        Err(err) => {
            let mut response = err.into_response();
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_CHALLENGE),
            );
            StageOutcome::ShortCircuit(response)
        }
    }
}

fn embed_identity(exchange: &mut ProxyExchange, _ctx: &StageContext<'_>) -> StageOutcome {
    match &exchange.session {
        Some(actor) => {
            exchange.identity = Some(actor.username.clone());
            StageOutcome::Continue
        }
        None => StageOutcome::ShortCircuit(
            ApiError::unauthorized("no authenticated session").into_response(),
        ),
    }
}

fn mark_remote_pull(exchange: &mut ProxyExchange, _ctx: &StageContext<'_>) -> StageOutcome {
    exchange.headers.insert(
        HeaderName::from_static(HEADER_REMOTE_PULL),
        HeaderValue::from_static("true"),
    );
    StageOutcome::Continue
}

fn substitute_credential(exchange: &mut ProxyExchange, ctx: &StageContext<'_>) -> StageOutcome {
    let Some(identity) = exchange.identity.as_deref() else {
        return StageOutcome::ShortCircuit(
            ApiError::unauthorized("no identity to substitute").into_response(),
        );
    };
    let credential = match HeaderValue::from_str(&ctx.upstream.credential(identity)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            value
        }
        Err(err) => {
            error!(error = %err, "service credential is not a valid header value");
            return StageOutcome::ShortCircuit(
                ApiError::internal("failed to build service credential").into_response(),
            );
        }
    };
    exchange.headers.remove(HEADER_API_KEY);
    exchange.headers.insert(AUTHORIZATION, credential);
    StageOutcome::Continue
}

fn rewrite_target(exchange: &mut ProxyExchange, ctx: &StageContext<'_>) -> StageOutcome {
    strip_hop_by_hop(&mut exchange.headers);
    exchange.headers.remove(HOST);
    exchange.target = Some(target_url(
        ctx.upstream.base(),
        &exchange.incoming_path,
        exchange.query.as_deref(),
    ));
    StageOutcome::Continue
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in named.iter().map(String::as_str).chain(HOP_BY_HOP) {
        headers.remove(name);
    }
}

fn scrub_set_cookie(headers: &mut HeaderMap) {
    headers.remove(SET_COOKIE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use tagrelay_config::RelayConfig;

    use crate::http::auth::authenticate;
    use crate::proxy::PullProxy;
    use crate::test_harness::{USER, USER_SECRET, relay_config};

    fn exchange(uri: &str, headers: &[(&str, &str)]) -> ProxyExchange {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        ProxyExchange::from_parts(parts)
    }

    fn ready(config: &RelayConfig) -> ProxyUpstream {
        match PullProxy::from_config(&config.remote_pull) {
            PullProxy::Ready(upstream) => upstream,
            PullProxy::Disabled { reason } => panic!("proxy disabled: {reason}"),
        }
    }

    #[test]
    fn missing_session_short_circuits_with_challenge() {
        let config = relay_config(Some("https://registry.example/v2"));
        let upstream = ready(&config);
        let ctx = StageContext {
            upstream: &upstream,
        };
        let mut exchange = exchange("/remote-pull/library/alpine/tags/list", &[]);

        let response = run_request_stages(&mut exchange, &ctx).expect("rejected");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        assert!(exchange.target.is_none());
    }

    #[test]
    fn stages_substitute_credential_and_rewrite_target() {
        let config = relay_config(Some("https://registry.example/v2"));
        let upstream = ready(&config);
        let ctx = StageContext {
            upstream: &upstream,
        };
        let api_key = format!("{USER}:{USER_SECRET}");
        let mut exchange = exchange(
            "/remote-pull/library/alpine/tags/list?n=10",
            &[
                ("x-tagrelay-api-key", api_key.as_str()),
                ("host", "relay.local"),
                ("connection", "keep-alive, x-trace"),
                ("x-trace", "1"),
            ],
        );
        exchange.verified = Some(authenticate(&config, &exchange.headers));

        assert!(run_request_stages(&mut exchange, &ctx).is_none());
        assert_eq!(exchange.identity.as_deref(), Some(USER));
        assert_eq!(
            exchange.headers.get(AUTHORIZATION).expect("authorization"),
            format!("Relay-Secret S@{USER}").as_str()
        );
        assert_eq!(
            exchange.headers.get(HEADER_REMOTE_PULL).expect("marker"),
            "true"
        );
        assert!(!exchange.headers.contains_key(HEADER_API_KEY));
        assert!(!exchange.headers.contains_key(HOST));
        assert!(!exchange.headers.contains_key(CONNECTION));
        assert!(!exchange.headers.contains_key("x-trace"));
        assert_eq!(
            exchange.target.expect("target").as_str(),
            "https://registry.example/v2/library/alpine/tags/list?n=10"
        );
    }

    #[test]
    fn rejected_credentials_short_circuit_with_challenge() {
        let config = relay_config(Some("https://registry.example/v2"));
        let upstream = ready(&config);
        let ctx = StageContext {
            upstream: &upstream,
        };
        let api_key = format!("{USER}:wrong");
        let mut exchange = exchange(
            "/remote-pull/library/alpine/tags/list",
            &[("x-tagrelay-api-key", api_key.as_str())],
        );
        exchange.verified = Some(authenticate(&config, &exchange.headers));

        let response = run_request_stages(&mut exchange, &ctx).expect("rejected");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        assert!(exchange.session.is_none());
    }

    #[test]
    fn response_stages_remove_cookies_and_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("session=upstream"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("docker-content-digest", HeaderValue::from_static("sha256:abc"));

        run_response_stages(&mut headers);

        assert!(!headers.contains_key(SET_COOKIE));
        assert!(!headers.contains_key("transfer-encoding"));
        assert!(headers.contains_key("docker-content-digest"));
    }

    #[test]
    fn exchange_tracks_path_relative_to_mount() {
        let request = Request::builder()
            .uri("/remote-pull/v2/")
            .body(Body::empty())
            .expect("request");
        let (parts, _body) = request.into_parts();
        let exchange = ProxyExchange::from_parts(parts);
        assert_eq!(exchange.incoming_path, "/v2/");
        assert!(exchange.query.is_none());
    }
}
