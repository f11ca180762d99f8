//! Authentication and authorization middleware for the HTTP layer.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose};
use subtle::ConstantTimeEq;
use tagrelay_config::{RelayConfig, Role};
use tracing::{debug, error};

use crate::http::constants::HEADER_API_KEY;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Authenticated caller attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Actor {
    pub(crate) username: String,
    pub(crate) role: Role,
}

impl Actor {
    pub(crate) fn require_privileged(&self) -> Result<(), ApiError> {
        if self.role.is_privileged() {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "role '{}' may not perform this operation",
                self.role.as_str()
            )))
        }
    }
}

pub(crate) async fn require_actor(
    State(state): State<Arc<ApiState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let actor = resolve_actor(Arc::clone(&state.config), req.headers().clone()).await?;
    debug!(username = %actor.username, role = actor.role.as_str(), "request authenticated");
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Accept calls from the job service carrying `{prefix}{jobservice secret}`.
pub(crate) async fn require_jobservice_secret(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.jobservice.secret.is_empty() {
        return Err(ApiError::unauthorized("job service secret is not configured"));
    }
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing job service credential"))?;
    if !jobservice_credential_matches(&state.config, presented) {
        return Err(ApiError::unauthorized("invalid job service credential"));
    }
    Ok(next.run(req).await)
}

/// Compare in constant time; only the length of the expected value leaks.
fn jobservice_credential_matches(config: &RelayConfig, presented: &str) -> bool {
    let expected = format!(
        "{}{}",
        config.remote_pull.secret_prefix, config.jobservice.secret
    );
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Run [`authenticate`] on the blocking pool so argon2 work stays off the executor.
pub(crate) async fn resolve_actor(
    config: Arc<RelayConfig>,
    headers: HeaderMap,
) -> Result<Actor, ApiError> {
    tokio::task::spawn_blocking(move || authenticate(&config, &headers))
        .await
        .map_err(|err| {
            error!(error = %err, "credential verification task failed");
            ApiError::internal("failed to verify credentials")
        })?
}

/// Resolve the caller from `x-tagrelay-api-key: username:secret` or HTTP Basic.
pub(crate) fn authenticate(config: &RelayConfig, headers: &HeaderMap) -> Result<Actor, ApiError> {
    let (username, secret) = extract_credentials(headers)?
        .ok_or_else(|| ApiError::unauthorized("missing credentials"))?;

    let account = config.authenticate(&username, &secret).map_err(|err| {
        error!(error = %err, username = %username, "failed to verify account secret");
        ApiError::internal("failed to verify credentials")
    })?;

    account
        .map(|account| Actor {
            username: account.username.clone(),
            role: account.role,
        })
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))
}

fn extract_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, ApiError> {
    if let Some(raw) = headers
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        let (username, secret) = raw
            .split_once(':')
            .ok_or_else(|| ApiError::unauthorized("API key must be provided as username:secret"))?;
        return Ok(Some((username.to_string(), secret.to_string())));
    }

    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let encoded = value
        .to_str()
        .ok()
        .and_then(|raw| raw.strip_prefix("Basic "))
        .ok_or_else(|| ApiError::unauthorized("unsupported authorization scheme"))?;
    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| ApiError::unauthorized("malformed basic credentials"))?;
    let (username, secret) = decoded
        .split_once(':')
        .ok_or_else(|| ApiError::unauthorized("malformed basic credentials"))?;
    Ok(Some((username.to_string(), secret.to_string())))
}
