//! Replication policy management endpoints.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tagrelay_core::{PolicyDraft, ReplicationPolicy};
use tracing::info;

use crate::http::auth::Actor;
use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn list_policies(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ReplicationPolicy>>, ApiError> {
    actor.require_privileged()?;
    Ok(Json(state.controller.list_policies().await?))
}

pub(crate) async fn get_policy(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Path(policy_id): Path<i64>,
) -> Result<Json<ReplicationPolicy>, ApiError> {
    actor.require_privileged()?;
    Ok(Json(state.controller.get_policy(policy_id).await?))
}

pub(crate) async fn create_policy(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Json(draft): Json<PolicyDraft>,
) -> Result<(StatusCode, Json<ReplicationPolicy>), ApiError> {
    actor.require_privileged()?;
    let policy = state.controller.create_policy(&draft).await?;
    info!(policy_id = policy.id, actor = %actor.username, "replication policy created");
    Ok((StatusCode::CREATED, Json(policy)))
}

pub(crate) async fn update_policy(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Path(policy_id): Path<i64>,
    Json(draft): Json<PolicyDraft>,
) -> Result<Json<ReplicationPolicy>, ApiError> {
    actor.require_privileged()?;
    let policy = state.controller.update_policy(policy_id, &draft).await?;
    info!(policy_id, actor = %actor.username, "replication policy updated");
    Ok(Json(policy))
}

pub(crate) async fn delete_policy(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Path(policy_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    actor.require_privileged()?;
    state.controller.remove_policy(policy_id).await?;
    info!(policy_id, actor = %actor.username, "replication policy removed");
    Ok(StatusCode::NO_CONTENT)
}
