//! Event payload types carried across the service.

use chrono::{DateTime, Utc};

/// Identifier assigned to each event emitted by the service.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Default depth of the live broadcast channel. Kept below the replay ring so
/// a lagging subscriber can recover skipped events from it.
pub const DEFAULT_LIVE_CAPACITY: usize = 256;

/// Policy identifier used for ad hoc (policy-less) replication requests.
pub const AD_HOC_POLICY_ID: i64 = -1;

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A replication run was requested, either for a stored policy or ad hoc.
    ReplicationRequested {
        /// Policy to replicate, or [`AD_HOC_POLICY_ID`] for single pulls.
        policy_id: i64,
        /// Ad hoc pull description; absent for policy triggers.
        metadata: Option<PullMetadata>,
    },
    /// A requested replication run could not be submitted.
    ReplicationFailed {
        /// Policy the failed run belonged to.
        policy_id: i64,
        /// Human-readable failure detail.
        message: String,
    },
    /// The job service reported a status transition for a ledger row.
    JobStatusChanged {
        /// Ledger identifier of the job.
        job_id: i64,
        /// Updated status.
        status: JobStatus,
    },
    /// System health status changed (degraded or restored components).
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for consumers and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ReplicationRequested { .. } => "replication_requested",
            Self::ReplicationFailed { .. } => "replication_failed",
            Self::JobStatusChanged { .. } => "job_status_changed",
            Self::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Unvalidated description of an ad hoc pull, as published by the single-pull trigger.
///
/// Every field is optional on the wire; the replication controller decides
/// which absences are fatal.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct PullMetadata {
    /// Source registry base URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Whether the source registry may be reached without TLS verification.
    #[serde(default)]
    pub insecure: bool,
    /// Candidate in `repository:tag` form.
    #[serde(default)]
    pub repository: Option<String>,
    /// Actor on whose behalf the pull is performed.
    #[serde(default)]
    pub pull_username: Option<String>,
}

/// Lifecycle of a replication job row.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Row created, not yet picked up by a worker.
    Pending,
    /// Worker is transferring content.
    Running,
    /// Worker finished successfully.
    Finished,
    /// Submission or transfer failed.
    Error,
}

impl JobStatus {
    /// Statuses that count as an in-flight run for duplicate-trigger checks.
    pub const IN_FLIGHT: [Self; 2] = [Self::Pending, Self::Running];

    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    /// Parse a stored status name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}
