//! Error types for replication operations.

use std::error::Error;

use thiserror::Error;

/// Primary error type for replication operations.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// No metadata accompanied an ad hoc request.
    #[error("metadata not found")]
    MetadataNotFound,
    /// Metadata lacked a usable source registry URL.
    #[error("target not found")]
    TargetNotFound,
    /// Metadata lacked a repository candidate.
    #[error("repository not found")]
    RepositoryNotFound,
    /// A candidate value could not be split into repository and tag.
    #[error("malformed repository candidate")]
    MalformedCandidate {
        /// Offending candidate value.
        value: String,
    },
    /// Transfer and delete candidates were mixed in one request.
    #[error("mixed replication operations are not supported")]
    MixedOperations,
    /// The referenced policy does not exist.
    #[error("replication policy not found")]
    PolicyNotFound {
        /// Requested policy identifier.
        policy_id: i64,
    },
    /// The referenced policy exists but is disabled.
    #[error("replication policy is disabled")]
    PolicyDisabled {
        /// Requested policy identifier.
        policy_id: i64,
    },
    /// The policy still has jobs in flight.
    #[error("replication policy has jobs in flight")]
    PolicyBusy {
        /// Policy identifier.
        policy_id: i64,
    },
    /// A policy draft failed validation.
    #[error("invalid replication policy")]
    InvalidPolicy {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The destination registry endpoint is not configured.
    #[error("external registry endpoint is not configured")]
    EndpointUnresolved,
    /// The job ledger rejected an operation.
    #[error("job ledger operation failed")]
    Ledger {
        /// Ledger operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The policy store rejected an operation.
    #[error("policy store operation failed")]
    PolicyStore {
        /// Store operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The job service refused or failed the submission.
    #[error("task submission failed")]
    Submission {
        /// Ledger row the submission belonged to.
        job_id: i64,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The task was accepted but its identifier could not be recorded.
    #[error("failed to attach task id to job")]
    AttachTaskId {
        /// Ledger row identifier.
        job_id: i64,
        /// Identifier returned by the job service.
        task_id: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl ReplicationError {
    /// Wrap a ledger failure with the operation that produced it.
    pub fn ledger(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Ledger {
            operation,
            source: source.into(),
        }
    }

    /// Wrap a policy store failure with the operation that produced it.
    pub fn policy_store(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::PolicyStore {
            operation,
            source: source.into(),
        }
    }

    /// Whether the error stems from caller input rather than a collaborator.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MetadataNotFound
                | Self::TargetNotFound
                | Self::RepositoryNotFound
                | Self::MalformedCandidate { .. }
                | Self::MixedOperations
                | Self::InvalidPolicy { .. }
        )
    }
}

/// Convenience alias for replication results.
pub type ReplicationResult<T> = Result<T, ReplicationError>;
