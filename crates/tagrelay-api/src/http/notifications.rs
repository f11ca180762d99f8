//! Status callbacks posted by the job service.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tagrelay_core::JobStatus;
use tagrelay_events::Event;
use tracing::{error, info};

use crate::http::errors::ApiError;
use crate::models::JobStatusNotification;
use crate::state::ApiState;

/// Map a reported status, including job-service aliases, onto the ledger lifecycle.
pub(crate) fn parse_reported_status(raw: &str) -> Option<JobStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Some(JobStatus::Pending),
        "running" => Some(JobStatus::Running),
        "finished" | "success" => Some(JobStatus::Finished),
        "error" | "stopped" | "cancelled" => Some(JobStatus::Error),
        _ => None,
    }
}

pub(crate) async fn job_status_changed(
    State(state): State<Arc<ApiState>>,
    Path(job_id): Path<i64>,
    Json(notification): Json<JobStatusNotification>,
) -> Result<StatusCode, ApiError> {
    let status = parse_reported_status(&notification.status).ok_or_else(|| {
        ApiError::bad_request(format!("unknown job status '{}'", notification.status))
    })?;

    let updated = state
        .ledger
        .update_status(job_id, status)
        .await
        .map_err(|err| {
            error!(error = %err, job_id, "failed to record job status");
            ApiError::internal("failed to record job status")
        })?;
    if !updated {
        return Err(ApiError::not_found(format!("replication job {job_id} not found")));
    }

    info!(job_id, status = status.as_str(), "replication job status updated");
    let _ = state.publish(Event::JobStatusChanged { job_id, status });
    Ok(StatusCode::OK)
}
