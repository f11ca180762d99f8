//! # Design
//!
//! - Centralize application-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error as StdError;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tagrelay_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tagrelay_telemetry::TelemetryError,
    },
    /// Connecting to the database failed.
    #[error("database connection failed")]
    Database {
        /// Operation identifier.
        operation: &'static str,
        /// Source driver error.
        source: sqlx::Error,
    },
    /// Persistence setup failed.
    #[error("persistence operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: tagrelay_data::DataError,
    },
    /// Building the job-service client failed.
    #[error("job service client setup failed")]
    JobService {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: tagrelay_api::ApiServerError,
    },
    /// A setting required at startup was not provided.
    #[error("missing configuration")]
    MissingConfig {
        /// Dotted name of the missing setting.
        field: &'static str,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tagrelay_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tagrelay_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: tagrelay_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) fn job_service(operation: &'static str, source: anyhow::Error) -> Self {
        Self::JobService {
            operation,
            source: source.into(),
        }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: tagrelay_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}
