//! Collaborator traits implemented by storage and job-service adapters.

use async_trait::async_trait;
use tagrelay_events::JobStatus;

use crate::model::{JobQuery, NewRepJob, PolicyDraft, RepJob, ReplicationPolicy, TaskDescriptor};

/// Persistent record of replication jobs and their status.
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Insert a pending row and return its identifier.
    async fn create_job(&self, job: NewRepJob) -> anyhow::Result<i64>;

    /// Set the status of a row; `Ok(false)` when the row does not exist.
    async fn update_status(&self, job_id: i64, status: JobStatus) -> anyhow::Result<bool>;

    /// Record the identifier assigned by the job service.
    async fn set_external_id(&self, job_id: i64, external_id: &str) -> anyhow::Result<()>;

    /// Count rows matching the query.
    async fn count_jobs(&self, query: &JobQuery) -> anyhow::Result<u64>;

    /// List rows matching the query, newest first.
    async fn list_jobs(&self, query: &JobQuery) -> anyhow::Result<Vec<RepJob>>;

    /// Fetch a single row.
    async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<RepJob>>;

    /// Check that the ledger is reachable.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Client for the asynchronous service that performs transfers.
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Submit a task and return the identifier the service assigned to it.
    async fn submit(&self, task: &TaskDescriptor) -> anyhow::Result<String>;
}

/// Persistent storage for replication policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// List every stored policy ordered by identifier.
    async fn list_policies(&self) -> anyhow::Result<Vec<ReplicationPolicy>>;

    /// Fetch a single policy.
    async fn get_policy(&self, policy_id: i64) -> anyhow::Result<Option<ReplicationPolicy>>;

    /// Persist a new policy.
    async fn create_policy(&self, draft: &PolicyDraft) -> anyhow::Result<ReplicationPolicy>;

    /// Replace a policy; `Ok(None)` when it does not exist.
    async fn update_policy(
        &self,
        policy_id: i64,
        draft: &PolicyDraft,
    ) -> anyhow::Result<Option<ReplicationPolicy>>;

    /// Delete a policy; `Ok(false)` when it does not exist.
    async fn remove_policy(&self, policy_id: i64) -> anyhow::Result<bool>;
}
