//! Replication job listing.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use tagrelay_core::{JobQuery, JobStatus, RepJob};
use tracing::error;

use crate::http::auth::Actor;
use crate::http::errors::ApiError;
use crate::models::{JobListParams, ProblemInvalidParam};
use crate::state::ApiState;

pub(crate) async fn list_jobs(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<JobListParams>,
) -> Result<Json<Vec<RepJob>>, ApiError> {
    actor.require_privileged()?;
    let query = job_query(&params)?;
    let jobs = state.ledger.list_jobs(&query).await.map_err(|err| {
        error!(error = %err, "failed to list replication jobs");
        ApiError::internal("failed to list replication jobs")
    })?;
    Ok(Json(jobs))
}

fn job_query(params: &JobListParams) -> Result<JobQuery, ApiError> {
    let statuses = match params.status.as_deref() {
        None => Vec::new(),
        Some(raw) => {
            let status = JobStatus::parse(raw).ok_or_else(|| {
                ApiError::bad_request("unknown job status").with_invalid_params(vec![
                    ProblemInvalidParam {
                        pointer: "/status".to_string(),
                        message: format!("'{raw}' is not a job status"),
                    },
                ])
            })?;
            vec![status]
        }
    };
    Ok(JobQuery {
        policy_id: params.policy_id,
        statuses,
    })
}
