//! Replication domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagrelay_events::{JobStatus, PullMetadata};

use crate::error::{ReplicationError, ReplicationResult};

/// Task name the job service uses for image transfers.
pub const IMAGE_TRANSFER_TASK: &str = "image-transfer";

/// Registry endpoint acting as the source of a transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicationTarget {
    /// Registry base URL.
    pub url: String,
    /// Whether TLS verification may be skipped when contacting the registry.
    #[serde(default)]
    pub insecure: bool,
}

/// Kind of resource a candidate names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// A `repository:tag` reference.
    #[default]
    Repository,
}

/// Replication operation applied to a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Copy the tag from the source registry.
    Transfer,
    /// Remove the tag from the destination registry.
    Delete,
}

impl Operation {
    /// Stable lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Delete => "delete",
        }
    }

    /// Parse a stored operation name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "transfer" => Some(Self::Transfer),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One tag selected for replication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterCandidate {
    /// Resource kind; always a repository reference today.
    #[serde(default)]
    pub kind: CandidateKind,
    /// Reference in `repository:tag` form.
    pub value: String,
    /// Operation to apply.
    pub operation: Operation,
    /// Actor on whose behalf the transfer runs.
    #[serde(default)]
    pub pull_username: Option<String>,
}

impl FilterCandidate {
    /// Build a transfer candidate for a `repository:tag` reference.
    #[must_use]
    pub fn transfer(value: impl Into<String>, pull_username: Option<String>) -> Self {
        Self {
            kind: CandidateKind::Repository,
            value: value.into(),
            operation: Operation::Transfer,
            pull_username,
        }
    }

    /// Split the reference into repository path and tag at the first `:`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::MalformedCandidate`] when the separator is
    /// missing or either side is empty.
    pub fn split(&self) -> ReplicationResult<(&str, &str)> {
        match self.value.split_once(':') {
            Some((repository, tag)) if !repository.is_empty() && !tag.is_empty() => {
                Ok((repository, tag))
            }
            _ => Err(ReplicationError::MalformedCandidate {
                value: self.value.clone(),
            }),
        }
    }
}

/// Engine input: which candidates to copy from which targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replication {
    /// Owning policy, or [`tagrelay_events::AD_HOC_POLICY_ID`].
    pub policy_id: i64,
    /// Tags to replicate.
    pub candidates: Vec<FilterCandidate>,
    /// Source registries.
    pub targets: Vec<ReplicationTarget>,
}

/// Validated ad hoc pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Source registry.
    pub target: ReplicationTarget,
    /// Candidate in `repository:tag` form.
    pub repository: String,
    /// Actor on whose behalf the pull runs, passed through unchanged.
    pub pull_username: Option<String>,
}

impl PullRequest {
    /// Validate raw pull metadata at the boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::MetadataNotFound`] when metadata is absent,
    /// [`ReplicationError::TargetNotFound`] when the URL is missing or empty and
    /// [`ReplicationError::RepositoryNotFound`] when the repository is missing or empty.
    pub fn from_metadata(metadata: Option<&PullMetadata>) -> ReplicationResult<Self> {
        let metadata = metadata.ok_or(ReplicationError::MetadataNotFound)?;
        let url = metadata
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ReplicationError::TargetNotFound)?;
        let repository = metadata
            .repository
            .as_deref()
            .filter(|repository| !repository.is_empty())
            .ok_or(ReplicationError::RepositoryNotFound)?;
        Ok(Self {
            target: ReplicationTarget {
                url: url.to_string(),
                insecure: metadata.insecure,
            },
            repository: repository.to_string(),
            pull_username: metadata.pull_username.clone(),
        })
    }

    /// Convert into the engine's request shape for the given policy.
    #[must_use]
    pub fn into_replication(self, policy_id: i64) -> Replication {
        Replication {
            policy_id,
            candidates: vec![FilterCandidate::transfer(
                self.repository,
                self.pull_username,
            )],
            targets: vec![self.target],
        }
    }
}

/// Ledger row describing one `(target, repository)` submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepJob {
    /// Ledger identifier.
    pub id: i64,
    /// Owning policy, or the ad hoc sentinel.
    pub policy_id: i64,
    /// Repository path.
    pub repository: String,
    /// Tags in order of first appearance.
    pub tags: Vec<String>,
    /// Operation recorded for the row.
    pub operation: Operation,
    /// Identifier assigned by the job service once submitted.
    pub external_id: Option<String>,
    /// Current status.
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Values required to create a ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepJob {
    /// Owning policy, or the ad hoc sentinel.
    pub policy_id: i64,
    /// Repository path.
    pub repository: String,
    /// Tags in order of first appearance.
    pub tags: Vec<String>,
    /// Operation to record.
    pub operation: Operation,
}

/// Filter applied to ledger listings and counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    /// Restrict to a single policy.
    pub policy_id: Option<i64>,
    /// Restrict to these statuses; empty means any.
    pub statuses: Vec<JobStatus>,
}

impl JobQuery {
    /// Query for the in-flight jobs of a policy.
    #[must_use]
    pub fn in_flight(policy_id: i64) -> Self {
        Self {
            policy_id: Some(policy_id),
            statuses: JobStatus::IN_FLIGHT.to_vec(),
        }
    }

    /// Whether a row satisfies the filter.
    #[must_use]
    pub fn matches(&self, job: &RepJob) -> bool {
        self.policy_id.is_none_or(|policy_id| policy_id == job.policy_id)
            && (self.statuses.is_empty() || self.statuses.contains(&job.status))
    }
}

/// Stored replication policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicationPolicy {
    /// Policy identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Registry the policy pulls from.
    pub source: ReplicationTarget,
    /// `repository:tag` references replicated by the policy.
    pub repositories: Vec<String>,
    /// Disabled policies cannot be triggered.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ReplicationPolicy {
    /// Engine request covering every reference of the policy.
    #[must_use]
    pub fn to_replication(&self) -> Replication {
        Replication {
            policy_id: self.id,
            candidates: self
                .repositories
                .iter()
                .map(|value| FilterCandidate::transfer(value.clone(), None))
                .collect(),
            targets: vec![self.source.clone()],
        }
    }
}

/// Caller-supplied fields for creating or replacing a policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDraft {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Registry the policy pulls from.
    pub source: ReplicationTarget,
    /// `repository:tag` references replicated by the policy.
    pub repositories: Vec<String>,
    /// Whether the policy may be triggered.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl PolicyDraft {
    /// Validate the draft before it reaches storage.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::InvalidPolicy`] naming the offending field.
    pub fn validate(&self) -> ReplicationResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "empty"));
        }
        if self.source.url.trim().is_empty() {
            return Err(invalid("source.url", "empty"));
        }
        if self.repositories.is_empty() {
            return Err(invalid("repositories", "empty"));
        }
        for value in &self.repositories {
            FilterCandidate::transfer(value.clone(), None)
                .split()
                .map_err(|_| invalid("repositories", "expected_repository_colon_tag"))?;
        }
        Ok(())
    }
}

const fn invalid(field: &'static str, reason: &'static str) -> ReplicationError {
    ReplicationError::InvalidPolicy { field, reason }
}

/// Kind of task submitted to the job service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TaskKind {
    /// Run-once task.
    #[default]
    Generic,
}

/// Scheduling metadata attached to every task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskMetadata {
    /// Task kind.
    pub kind: TaskKind,
}

/// Parameters of an `image-transfer` task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferParameters {
    /// Repository path.
    pub repository: String,
    /// Tags to transfer.
    pub tags: Vec<String>,
    /// Source registry URL.
    pub src_registry_url: String,
    /// Whether the source registry may skip TLS verification.
    pub src_registry_insecure: bool,
    /// Destination registry URL.
    pub dst_registry_url: String,
    /// Always `true`: the destination is the local registry.
    pub dst_registry_insecure: bool,
    /// Actor on whose behalf the transfer runs.
    pub pull_username: Option<String>,
}

/// Opaque description of work handed to the job service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDescriptor {
    /// Task name; set for transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Task parameters; set for transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<TransferParameters>,
    /// Scheduling metadata.
    pub metadata: TaskMetadata,
    /// URL the job service calls back with status transitions.
    pub status_hook: String,
}

impl TaskDescriptor {
    /// Descriptor with only the status callback populated.
    #[must_use]
    pub fn generic(status_hook: impl Into<String>) -> Self {
        Self {
            name: None,
            parameters: None,
            metadata: TaskMetadata::default(),
            status_hook: status_hook.into(),
        }
    }

    /// Attach transfer parameters and the transfer task name.
    #[must_use]
    pub fn with_transfer(mut self, parameters: TransferParameters) -> Self {
        self.name = Some(IMAGE_TRANSFER_TASK.to_string());
        self.parameters = Some(parameters);
        self
    }
}
