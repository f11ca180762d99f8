//! Request and response payloads exchanged over the HTTP API.

use serde::{Deserialize, Serialize};

/// RFC9457-compatible problem document returned on errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Parameters that failed validation, if applicable.
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON Pointer to the offending field.
    pub pointer: String,
    /// Human-readable description of the validation failure.
    pub message: String,
}

/// Body of `POST /api/replications`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicationTriggerRequest {
    /// Policy to replicate.
    pub policy_id: i64,
}

/// Body of `POST /api/replications/pull/single`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinglePullRequest {
    /// Reference to transfer, in `repository:tag` form.
    pub repository: String,
}

/// Acknowledgement returned once a replication request is queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicationAccepted {
    /// Identifier of the published start-replication event.
    pub event_id: u64,
}

/// Status callback posted by the job service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatusNotification {
    /// Reported status; job-service aliases are accepted.
    pub status: String,
}

/// Query parameters for `GET /api/jobs/replication`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobListParams {
    /// Restrict to a single policy.
    #[serde(default)]
    pub policy_id: Option<i64>,
    /// Restrict to one status.
    #[serde(default)]
    pub status: Option<String>,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Build revision of the running binary.
    pub build: String,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FullHealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Build revision of the running binary.
    pub build: String,
    /// Components currently considered degraded.
    pub degraded: Vec<String>,
    /// Pull proxy readiness.
    pub remote_pull: RemotePullHealth,
    /// Counter snapshot.
    pub metrics: HealthMetrics,
}

/// Pull proxy readiness as reported by `/health/full`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemotePullHealth {
    /// Whether the proxy forwards requests.
    pub ready: bool,
    /// Why the proxy is disabled, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Counter values surfaced by `/health/full`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthMetrics {
    /// Transfer jobs accepted by the job service.
    pub replication_jobs_submitted_total: u64,
    /// Transfer jobs that failed to submit.
    pub replication_submit_failures_total: u64,
    /// Pull proxy exchanges that reached the upstream.
    pub remote_pull_forwarded_total: u64,
}
