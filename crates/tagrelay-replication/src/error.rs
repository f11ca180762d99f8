//! Error types for replication trigger entry points.

use std::error::Error;

use thiserror::Error;

/// Failures raised while accepting a replication trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The referenced policy does not exist.
    #[error("replication policy not found")]
    PolicyNotFound {
        /// Requested policy identifier.
        policy_id: i64,
    },
    /// The referenced policy is disabled.
    #[error("replication policy is disabled")]
    PolicyDisabled {
        /// Requested policy identifier.
        policy_id: i64,
    },
    /// Jobs for the policy are still pending or running.
    #[error("replication jobs already in flight")]
    JobsInFlight {
        /// Policy identifier.
        policy_id: i64,
        /// Number of in-flight jobs observed.
        count: u64,
    },
    /// The single-pull upstream is not configured.
    #[error("single pull source is not configured")]
    SinglePullUnavailable,
    /// The single-pull request named no repository.
    #[error("repository must not be empty")]
    EmptyRepository,
    /// The single-pull repository does not name a tag.
    #[error("repository must be in repository:tag form")]
    UntaggedRepository {
        /// Offending repository value.
        value: String,
    },
    /// A collaborator failed while checking preconditions.
    #[error("replication trigger lookup failed")]
    Lookup {
        /// Collaborator operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl TriggerError {
    pub(crate) fn lookup(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Lookup {
            operation,
            source: source.into(),
        }
    }
}

/// Convenience alias for trigger results.
pub type TriggerResult<T> = Result<T, TriggerError>;
