//! Replicator engine: turns candidates and targets into ledger rows and
//! job-service submissions.
//!
//! # Design
//! - Rows are keyed per `(target, repository)`, never per tag.
//! - Work is strictly sequential; a failure aborts the remaining pairs and
//!   leaves earlier submissions in place.
//! - Secondary failures while marking a row as errored are logged, never returned.

use std::sync::Arc;

use indexmap::IndexMap;
use tagrelay_core::{
    FilterCandidate, JobLedger, JobStatus, NewRepJob, Operation, Replication, ReplicationError,
    ReplicationResult, ReplicationTarget, TaskClient, TaskDescriptor, TransferParameters,
};
use tagrelay_telemetry::Metrics;
use tracing::{debug, error, info, warn};

/// Static settings consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Base URL the job service uses to reach the status callback.
    pub internal_base_url: String,
    /// Destination registry for transfers; resolved per submission.
    pub external_endpoint: Option<String>,
}

impl EngineSettings {
    fn resolve_endpoint(&self) -> ReplicationResult<&str> {
        self.external_endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.is_empty())
            .ok_or(ReplicationError::EndpointUnresolved)
    }
}

/// Build the status callback URL for a ledger row.
#[must_use]
pub fn status_hook_url(internal_base_url: &str, job_id: i64) -> String {
    format!(
        "{}/service/notifications/jobs/replication/{job_id}",
        internal_base_url.trim_end_matches('/')
    )
}

/// Replication strategies, chosen at construction.
pub enum Replicator {
    /// Pull tags from a remote registry into the local one.
    Pull(PullReplicator),
}

impl Replicator {
    /// Run the selected strategy and return the submitted ledger ids.
    ///
    /// # Errors
    ///
    /// Propagates the strategy's [`ReplicationError`].
    pub async fn replicate(&self, replication: &Replication) -> ReplicationResult<Vec<i64>> {
        match self {
            Self::Pull(replicator) => replicator.replicate(replication).await,
        }
    }
}

/// Engine that submits pull transfers to the job service.
pub struct PullReplicator {
    ledger: Arc<dyn JobLedger>,
    tasks: Arc<dyn TaskClient>,
    settings: EngineSettings,
    metrics: Metrics,
}

struct Grouped<'a> {
    repositories: IndexMap<&'a str, Vec<String>>,
    operation: Operation,
    pull_username: Option<&'a str>,
}

impl PullReplicator {
    /// Construct an engine over the given collaborators.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn JobLedger>,
        tasks: Arc<dyn TaskClient>,
        settings: EngineSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            ledger,
            tasks,
            settings,
            metrics,
        }
    }

    /// Submit one job per target and repository.
    ///
    /// Returns the ledger ids of every submitted row, in submission order.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed or mixed candidates before any
    /// ledger write; otherwise the first ledger, resolution, submission or
    /// attachment failure.
    pub async fn replicate(&self, replication: &Replication) -> ReplicationResult<Vec<i64>> {
        let Some(grouped) = group_candidates(&replication.candidates)? else {
            debug!(policy_id = replication.policy_id, "no candidates to replicate");
            return Ok(Vec::new());
        };

        let mut submitted = Vec::new();
        for target in &replication.targets {
            for (repository, tags) in &grouped.repositories {
                let job_id = self
                    .submit_one(replication.policy_id, target, repository, tags, &grouped)
                    .await?;
                submitted.push(job_id);
            }
        }

        info!(
            policy_id = replication.policy_id,
            jobs = submitted.len(),
            "replication submitted"
        );
        Ok(submitted)
    }

    async fn submit_one(
        &self,
        policy_id: i64,
        target: &ReplicationTarget,
        repository: &str,
        tags: &[String],
        grouped: &Grouped<'_>,
    ) -> ReplicationResult<i64> {
        let job_id = self
            .ledger
            .create_job(NewRepJob {
                policy_id,
                repository: repository.to_string(),
                tags: tags.to_vec(),
                operation: grouped.operation,
            })
            .await
            .map_err(ReplicationError::ledger("create_job"))?;

        let descriptor = match self.describe(job_id, target, repository, tags, grouped) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.mark_failed(job_id).await;
                return Err(err);
            }
        };

        debug!(
            job_id,
            repository,
            ?tags,
            operation = grouped.operation.as_str(),
            target = %target.url,
            "submitting replication job"
        );
        let task_id = match self.tasks.submit(&descriptor).await {
            Ok(task_id) => task_id,
            Err(err) => {
                self.metrics.inc_submit_failure();
                error!(job_id, repository, error = %err, "task submission failed");
                self.mark_failed(job_id).await;
                return Err(ReplicationError::Submission {
                    job_id,
                    source: err.into(),
                });
            }
        };
        self.metrics.inc_job_submitted();

        self.ledger
            .set_external_id(job_id, &task_id)
            .await
            .map_err(|err| {
                error!(job_id, task_id = %task_id, error = %err, "failed to attach task id");
                ReplicationError::AttachTaskId {
                    job_id,
                    task_id: task_id.clone(),
                    source: err.into(),
                }
            })?;
        Ok(job_id)
    }

    fn describe(
        &self,
        job_id: i64,
        target: &ReplicationTarget,
        repository: &str,
        tags: &[String],
        grouped: &Grouped<'_>,
    ) -> ReplicationResult<TaskDescriptor> {
        let descriptor =
            TaskDescriptor::generic(status_hook_url(&self.settings.internal_base_url, job_id));
        if grouped.operation != Operation::Transfer {
            return Ok(descriptor);
        }
        let destination = self.settings.resolve_endpoint()?;
        Ok(descriptor.with_transfer(TransferParameters {
            repository: repository.to_string(),
            tags: tags.to_vec(),
            src_registry_url: target.url.clone(),
            src_registry_insecure: target.insecure,
            dst_registry_url: destination.to_string(),
            dst_registry_insecure: true,
            pull_username: grouped.pull_username.map(str::to_string),
        }))
    }

    async fn mark_failed(&self, job_id: i64) {
        match self.ledger.update_status(job_id, JobStatus::Error).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id, "job vanished before it could be marked as failed"),
            Err(err) => error!(job_id, error = %err, "failed to mark job as failed"),
        }
    }
}

fn group_candidates(candidates: &[FilterCandidate]) -> ReplicationResult<Option<Grouped<'_>>> {
    let mut repositories: IndexMap<&str, Vec<String>> = IndexMap::new();
    let mut operation = None;
    let mut pull_username = None;

    for candidate in candidates {
        let (repository, tag) = candidate.split()?;
        match operation {
            Some(seen) if seen != candidate.operation => {
                return Err(ReplicationError::MixedOperations);
            }
            _ => operation = Some(candidate.operation),
        }
        repositories
            .entry(repository)
            .or_default()
            .push(tag.to_string());
        pull_username = candidate.pull_username.as_deref();
    }

    Ok(operation.map(|operation| Grouped {
        repositories,
        operation,
        pull_username,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagrelay_core::IMAGE_TRANSFER_TASK;
    use tagrelay_test_support::{RecordingLedger, RecordingTaskClient};

    struct Harness {
        ledger: Arc<RecordingLedger>,
        tasks: Arc<RecordingTaskClient>,
        metrics: Metrics,
        replicator: PullReplicator,
    }

    fn harness(external_endpoint: Option<&str>) -> Harness {
        let ledger = Arc::new(RecordingLedger::new());
        let tasks = Arc::new(RecordingTaskClient::new());
        let metrics = Metrics::new().expect("metrics registry");
        let replicator = PullReplicator::new(
            ledger.clone(),
            tasks.clone(),
            EngineSettings {
                internal_base_url: "http://core:8080/".into(),
                external_endpoint: external_endpoint.map(str::to_string),
            },
            metrics.clone(),
        );
        Harness {
            ledger,
            tasks,
            metrics,
            replicator,
        }
    }

    fn target(url: &str) -> ReplicationTarget {
        ReplicationTarget {
            url: url.into(),
            insecure: false,
        }
    }

    fn request(values: &[&str], targets: Vec<ReplicationTarget>) -> Replication {
        Replication {
            policy_id: 7,
            candidates: values
                .iter()
                .map(|value| FilterCandidate::transfer(*value, Some("alice".into())))
                .collect(),
            targets,
        }
    }

    #[tokio::test]
    async fn tags_group_per_repository_in_first_seen_order() -> anyhow::Result<()> {
        let h = harness(Some("https://local.example"));
        let replication = request(
            &["library/b:1", "library/a:1", "library/b:2"],
            vec![target("https://hub.example")],
        );

        let ids = h.replicator.replicate(&replication).await?;
        assert_eq!(ids, vec![1, 2]);

        let jobs = h.ledger.jobs();
        assert_eq!(jobs[0].repository, "library/b");
        assert_eq!(jobs[0].tags, vec!["1", "2"]);
        assert_eq!(jobs[1].repository, "library/a");
        assert_eq!(jobs[0].external_id.as_deref(), Some("task-1"));
        assert_eq!(jobs[0].operation, Operation::Transfer);
        Ok(())
    }

    #[tokio::test]
    async fn transfer_descriptor_carries_parameters_and_callback() -> anyhow::Result<()> {
        let h = harness(Some("https://local.example"));
        h.replicator
            .replicate(&request(&["library/app:1.0"], vec![target("https://hub.example")]))
            .await?;

        let submitted = h.tasks.submitted();
        let descriptor = &submitted[0];
        assert_eq!(descriptor.name.as_deref(), Some(IMAGE_TRANSFER_TASK));
        assert_eq!(
            descriptor.status_hook,
            "http://core:8080/service/notifications/jobs/replication/1"
        );
        let parameters = descriptor.parameters.as_ref().expect("transfer parameters");
        assert_eq!(parameters.src_registry_url, "https://hub.example");
        assert_eq!(parameters.dst_registry_url, "https://local.example");
        assert!(parameters.dst_registry_insecure);
        assert_eq!(parameters.pull_username.as_deref(), Some("alice"));
        assert_eq!(h.metrics.snapshot().replication_jobs_submitted_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn one_row_per_target_and_repository() -> anyhow::Result<()> {
        let h = harness(Some("https://local.example"));
        let ids = h
            .replicator
            .replicate(&request(
                &["library/app:1", "library/app:2"],
                vec![target("https://a.example"), target("https://b.example")],
            ))
            .await?;
        assert_eq!(ids.len(), 2);
        assert_eq!(h.tasks.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_candidate_writes_nothing() {
        let h = harness(Some("https://local.example"));
        let err = h
            .replicator
            .replicate(&request(&["library/app:1", "no-tag"], vec![target("https://hub")]))
            .await
            .expect_err("separator is required");
        assert!(matches!(err, ReplicationError::MalformedCandidate { .. }));
        assert_eq!(h.ledger.create_calls(), 0);
        assert_eq!(h.tasks.calls(), 0);
    }

    #[tokio::test]
    async fn mixed_operations_are_rejected_before_writes() {
        let h = harness(Some("https://local.example"));
        let mut replication = request(&["library/app:1", "library/app:2"], vec![target("https://hub")]);
        replication.candidates[1].operation = Operation::Delete;
        let err = h
            .replicator
            .replicate(&replication)
            .await
            .expect_err("mixing is unsupported");
        assert!(matches!(err, ReplicationError::MixedOperations));
        assert_eq!(h.ledger.create_calls(), 0);
    }

    #[tokio::test]
    async fn ledger_failure_aborts_without_rolling_back_earlier_pairs() {
        let h = harness(Some("https://local.example"));
        h.ledger.fail_create_at(2);
        let err = h
            .replicator
            .replicate(&request(&["library/a:1", "library/b:1", "library/c:1"], vec![target("https://hub")]))
            .await
            .expect_err("second create fails");

        assert!(matches!(
            err,
            ReplicationError::Ledger {
                operation: "create_job",
                ..
            }
        ));
        assert_eq!(h.tasks.calls(), 1);
        let jobs = h.ledger.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].external_id.as_deref(), Some("task-1"));
    }

    #[tokio::test]
    async fn submission_failure_marks_row_and_returns_original_error() {
        let h = harness(Some("https://local.example"));
        h.tasks.fail_at(1);
        let err = h
            .replicator
            .replicate(&request(&["library/app:1"], vec![target("https://hub")]))
            .await
            .expect_err("submission fails");

        match err {
            ReplicationError::Submission { job_id, source } => {
                assert_eq!(job_id, 1);
                assert_eq!(source.to_string(), "scripted submission failure");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.ledger.jobs()[0].status, JobStatus::Error);
        assert_eq!(h.metrics.snapshot().replication_submit_failures_total, 1);
    }

    #[tokio::test]
    async fn status_marking_failure_does_not_mask_submission_error() {
        let h = harness(Some("https://local.example"));
        h.tasks.fail_at(1);
        h.ledger.fail_status_updates();
        let err = h
            .replicator
            .replicate(&request(&["library/app:1"], vec![target("https://hub")]))
            .await
            .expect_err("submission fails");
        assert!(matches!(err, ReplicationError::Submission { .. }));
        assert_eq!(h.ledger.status_updates(), vec![(1, JobStatus::Error)]);
    }

    #[tokio::test]
    async fn attach_failure_is_returned_after_task_exists() {
        let h = harness(Some("https://local.example"));
        h.ledger.fail_attach();
        let err = h
            .replicator
            .replicate(&request(&["library/app:1"], vec![target("https://hub")]))
            .await
            .expect_err("attach fails");
        assert!(matches!(
            err,
            ReplicationError::AttachTaskId { job_id: 1, ref task_id, .. } if task_id == "task-1"
        ));
        assert_eq!(h.tasks.submitted().len(), 1);
    }

    #[tokio::test]
    async fn unresolved_endpoint_aborts_transfer() {
        let h = harness(None);
        let err = h
            .replicator
            .replicate(&request(&["library/app:1"], vec![target("https://hub")]))
            .await
            .expect_err("endpoint is required for transfers");
        assert!(matches!(err, ReplicationError::EndpointUnresolved));
        assert_eq!(h.tasks.calls(), 0);
        assert_eq!(h.ledger.jobs()[0].status, JobStatus::Error);
    }

    #[tokio::test]
    async fn delete_descriptor_has_no_transfer_parameters() -> anyhow::Result<()> {
        let h = harness(None);
        let mut replication = request(&["library/app:1"], vec![target("https://hub")]);
        replication.candidates[0].operation = Operation::Delete;
        Replicator::Pull(h.replicator).replicate(&replication).await?;
        let submitted = h.tasks.submitted();
        assert!(submitted[0].name.is_none());
        assert!(submitted[0].parameters.is_none());
        assert_eq!(h.ledger.jobs()[0].operation, Operation::Delete);
        Ok(())
    }

    #[tokio::test]
    async fn empty_candidates_are_a_no_op() -> anyhow::Result<()> {
        let h = harness(None);
        let ids = h
            .replicator
            .replicate(&request(&[], vec![target("https://hub")]))
            .await?;
        assert!(ids.is_empty());
        assert_eq!(h.ledger.create_calls(), 0);
        Ok(())
    }
}
