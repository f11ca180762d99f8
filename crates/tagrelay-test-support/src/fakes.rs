//! In-memory collaborators that record every call and fail on request.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use tagrelay_core::{
    JobLedger, JobQuery, JobStatus, NewRepJob, PolicyDraft, PolicyStore, RepJob,
    ReplicationPolicy, TaskClient, TaskDescriptor,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct LedgerState {
    jobs: Vec<RepJob>,
    status_updates: Vec<(i64, JobStatus)>,
    create_calls: usize,
    fail_create_at: Option<usize>,
    fail_status_updates: bool,
    fail_attach: bool,
    fail_ping: bool,
}

/// Job ledger that keeps rows in memory.
#[derive(Default)]
pub struct RecordingLedger {
    state: Mutex<LedgerState>,
}

impl RecordingLedger {
    /// Empty ledger that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th `create_job` call (1-based).
    pub fn fail_create_at(&self, n: usize) {
        lock(&self.state).fail_create_at = Some(n);
    }

    /// Fail every status update.
    pub fn fail_status_updates(&self) {
        lock(&self.state).fail_status_updates = true;
    }

    /// Fail every external id attachment.
    pub fn fail_attach(&self) {
        lock(&self.state).fail_attach = true;
    }

    /// Fail health probes.
    pub fn fail_ping(&self) {
        lock(&self.state).fail_ping = true;
    }

    /// Insert a row directly, bypassing failure injection.
    pub fn seed(&self, job: NewRepJob, status: JobStatus) -> i64 {
        let mut state = lock(&self.state);
        insert(&mut state, job, status)
    }

    /// Snapshot of stored rows in creation order.
    #[must_use]
    pub fn jobs(&self) -> Vec<RepJob> {
        lock(&self.state).jobs.clone()
    }

    /// Every status update attempted, including failed ones.
    #[must_use]
    pub fn status_updates(&self) -> Vec<(i64, JobStatus)> {
        lock(&self.state).status_updates.clone()
    }

    /// Number of `create_job` calls observed.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        lock(&self.state).create_calls
    }
}

fn insert(state: &mut LedgerState, job: NewRepJob, status: JobStatus) -> i64 {
    let id = i64::try_from(state.jobs.len()).unwrap_or(i64::MAX - 1) + 1;
    let now = Utc::now();
    state.jobs.push(RepJob {
        id,
        policy_id: job.policy_id,
        repository: job.repository,
        tags: job.tags,
        operation: job.operation,
        external_id: None,
        status,
        created_at: now,
        updated_at: now,
    });
    id
}

#[async_trait]
impl JobLedger for RecordingLedger {
    async fn create_job(&self, job: NewRepJob) -> anyhow::Result<i64> {
        let mut state = lock(&self.state);
        state.create_calls += 1;
        if state.fail_create_at == Some(state.create_calls) {
            bail!("scripted create failure");
        }
        Ok(insert(&mut state, job, JobStatus::Pending))
    }

    async fn update_status(&self, job_id: i64, status: JobStatus) -> anyhow::Result<bool> {
        let mut state = lock(&self.state);
        state.status_updates.push((job_id, status));
        if state.fail_status_updates {
            bail!("scripted status failure");
        }
        Ok(state
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .map(|job| {
                job.status = status;
                job.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn set_external_id(&self, job_id: i64, external_id: &str) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_attach {
            bail!("scripted attach failure");
        }
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| anyhow!("job {job_id} not found"))?;
        job.external_id = Some(external_id.to_string());
        Ok(())
    }

    async fn count_jobs(&self, query: &JobQuery) -> anyhow::Result<u64> {
        let count = lock(&self.state)
            .jobs
            .iter()
            .filter(|job| query.matches(job))
            .count();
        Ok(u64::try_from(count)?)
    }

    async fn list_jobs(&self, query: &JobQuery) -> anyhow::Result<Vec<RepJob>> {
        Ok(lock(&self.state)
            .jobs
            .iter()
            .rev()
            .filter(|job| query.matches(job))
            .cloned()
            .collect())
    }

    async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<RepJob>> {
        Ok(lock(&self.state)
            .jobs
            .iter()
            .find(|job| job.id == job_id)
            .cloned())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if lock(&self.state).fail_ping {
            bail!("scripted ping failure");
        }
        Ok(())
    }
}

#[derive(Default)]
struct TaskState {
    submitted: Vec<TaskDescriptor>,
    calls: usize,
    fail_at: Option<usize>,
}

/// Task client that records descriptors and returns `task-{n}` identifiers.
#[derive(Default)]
pub struct RecordingTaskClient {
    state: Mutex<TaskState>,
}

impl RecordingTaskClient {
    /// Client that accepts every submission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th submission (1-based).
    pub fn fail_at(&self, n: usize) {
        lock(&self.state).fail_at = Some(n);
    }

    /// Descriptors accepted so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<TaskDescriptor> {
        lock(&self.state).submitted.clone()
    }

    /// Number of submissions attempted, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }
}

#[async_trait]
impl TaskClient for RecordingTaskClient {
    async fn submit(&self, task: &TaskDescriptor) -> anyhow::Result<String> {
        let mut state = lock(&self.state);
        state.calls += 1;
        if state.fail_at == Some(state.calls) {
            bail!("scripted submission failure");
        }
        state.submitted.push(task.clone());
        Ok(format!("task-{}", state.calls))
    }
}

#[derive(Default)]
struct PolicyState {
    policies: BTreeMap<i64, ReplicationPolicy>,
    next_id: i64,
    fail: bool,
}

/// Policy store backed by an ordered map.
#[derive(Default)]
pub struct MemoryPolicyStore {
    state: Mutex<PolicyState>,
}

impl MemoryPolicyStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent call.
    pub fn fail_all(&self) {
        lock(&self.state).fail = true;
    }

    /// Insert a policy synchronously and return it.
    pub fn insert(&self, draft: &PolicyDraft) -> ReplicationPolicy {
        let mut state = lock(&self.state);
        store(&mut state, draft)
    }
}

fn store(state: &mut PolicyState, draft: &PolicyDraft) -> ReplicationPolicy {
    state.next_id += 1;
    let now = Utc::now();
    let policy = ReplicationPolicy {
        id: state.next_id,
        name: draft.name.clone(),
        description: draft.description.clone(),
        source: draft.source.clone(),
        repositories: draft.repositories.clone(),
        enabled: draft.enabled,
        created_at: now,
        updated_at: now,
    };
    state.policies.insert(policy.id, policy.clone());
    policy
}

impl PolicyState {
    fn check(&self) -> anyhow::Result<()> {
        if self.fail {
            bail!("scripted policy store failure");
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn list_policies(&self) -> anyhow::Result<Vec<ReplicationPolicy>> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.policies.values().cloned().collect())
    }

    async fn get_policy(&self, policy_id: i64) -> anyhow::Result<Option<ReplicationPolicy>> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.policies.get(&policy_id).cloned())
    }

    async fn create_policy(&self, draft: &PolicyDraft) -> anyhow::Result<ReplicationPolicy> {
        let mut state = lock(&self.state);
        state.check()?;
        Ok(store(&mut state, draft))
    }

    async fn update_policy(
        &self,
        policy_id: i64,
        draft: &PolicyDraft,
    ) -> anyhow::Result<Option<ReplicationPolicy>> {
        let mut state = lock(&self.state);
        state.check()?;
        Ok(state.policies.get_mut(&policy_id).map(|policy| {
            policy.name.clone_from(&draft.name);
            policy.description.clone_from(&draft.description);
            policy.source = draft.source.clone();
            policy.repositories.clone_from(&draft.repositories);
            policy.enabled = draft.enabled;
            policy.updated_at = Utc::now();
            policy.clone()
        }))
    }

    async fn remove_policy(&self, policy_id: i64) -> anyhow::Result<bool> {
        let mut state = lock(&self.state);
        state.check()?;
        Ok(state.policies.remove(&policy_id).is_some())
    }
}
