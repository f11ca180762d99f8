//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tagrelay_core::ReplicationError;
use tagrelay_replication::TriggerError;
use tracing::error;

use crate::http::constants::{
    PROBLEM_BAD_GATEWAY, PROBLEM_BAD_REQUEST, PROBLEM_CONFLICT, PROBLEM_FORBIDDEN,
    PROBLEM_INTERNAL, PROBLEM_NOT_FOUND, PROBLEM_PRECONDITION_FAILED,
    PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_UNAUTHORIZED,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn precondition_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PRECONDITION_FAILED,
            PROBLEM_PRECONDITION_FAILED,
            "precondition failed",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_gateway(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, PROBLEM_BAD_GATEWAY, "bad gateway").with_detail(detail)
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        match &err {
            TriggerError::PolicyNotFound { .. } => Self::not_found(err.to_string()),
            TriggerError::PolicyDisabled { .. } | TriggerError::JobsInFlight { .. } => {
                Self::precondition_failed(err.to_string())
            }
            TriggerError::SinglePullUnavailable => Self::service_unavailable(err.to_string()),
            TriggerError::EmptyRepository | TriggerError::UntaggedRepository { .. } => {
                Self::bad_request(err.to_string()).with_invalid_params(vec![ProblemInvalidParam {
                    pointer: "/repository".to_string(),
                    message: err.to_string(),
                }])
            }
            TriggerError::Lookup { operation, .. } => {
                error!(error = %err, operation, "replication trigger lookup failed");
                Self::internal("failed to check replication preconditions")
            }
        }
    }
}

impl From<ReplicationError> for ApiError {
    fn from(err: ReplicationError) -> Self {
        if let ReplicationError::InvalidPolicy { field, reason } = &err {
            return Self::bad_request(err.to_string()).with_invalid_params(vec![
                ProblemInvalidParam {
                    pointer: format!("/{}", field.replace('.', "/")),
                    message: (*reason).to_string(),
                },
            ]);
        }
        if err.is_validation() {
            return Self::bad_request(err.to_string());
        }
        match &err {
            ReplicationError::PolicyNotFound { .. } => Self::not_found(err.to_string()),
            ReplicationError::PolicyDisabled { .. } => Self::precondition_failed(err.to_string()),
            ReplicationError::PolicyBusy { .. } => Self::conflict(err.to_string()),
            _ => {
                error!(error = %err, "replication request failed");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        (self.status, Json(body)).into_response()
    }
}
