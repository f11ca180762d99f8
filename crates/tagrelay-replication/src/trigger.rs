//! Trigger entry points: precondition checks followed by a start-replication event.
//!
//! The in-flight check is a read followed by a publish; two concurrent
//! triggers for the same policy can both pass it.

use std::sync::Arc;

use tagrelay_core::{
    AD_HOC_POLICY_ID, FilterCandidate, JobLedger, JobQuery, PolicyStore, PullMetadata,
};
use tagrelay_events::{Event, EventBus, EventId};
use tagrelay_telemetry::Metrics;
use tracing::{info, warn};

use crate::error::{TriggerError, TriggerResult};

/// Source registry used for ad hoc single pulls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePullSource {
    /// Upstream registry base URL.
    pub url: String,
    /// Whether the upstream may be reached without TLS verification.
    pub insecure: bool,
}

/// Accepts replication triggers and publishes them on the event bus.
pub struct TriggerService {
    policies: Arc<dyn PolicyStore>,
    ledger: Arc<dyn JobLedger>,
    events: EventBus,
    metrics: Metrics,
    single_pull: Option<SinglePullSource>,
}

impl TriggerService {
    /// Construct the trigger service.
    #[must_use]
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        ledger: Arc<dyn JobLedger>,
        events: EventBus,
        metrics: Metrics,
        single_pull: Option<SinglePullSource>,
    ) -> Self {
        Self {
            policies,
            ledger,
            events,
            metrics,
            single_pull,
        }
    }

    /// Whether ad hoc single pulls can be accepted.
    #[must_use]
    pub const fn single_pull_enabled(&self) -> bool {
        self.single_pull.is_some()
    }

    /// Request a run of a stored policy.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::PolicyNotFound`], [`TriggerError::PolicyDisabled`],
    /// [`TriggerError::JobsInFlight`] or a lookup failure. Nothing is published
    /// on error.
    pub async fn trigger_policy(&self, policy_id: i64) -> TriggerResult<EventId> {
        let policy = self
            .policies
            .get_policy(policy_id)
            .await
            .map_err(TriggerError::lookup("get_policy"))?
            .ok_or(TriggerError::PolicyNotFound { policy_id })?;
        if !policy.enabled {
            return Err(TriggerError::PolicyDisabled { policy_id });
        }

        let count = self
            .ledger
            .count_jobs(&JobQuery::in_flight(policy_id))
            .await
            .map_err(TriggerError::lookup("count_jobs"))?;
        if count > 0 {
            warn!(policy_id, count, "replication already in flight");
            return Err(TriggerError::JobsInFlight { policy_id, count });
        }

        let id = self.publish(Event::ReplicationRequested {
            policy_id,
            metadata: None,
        });
        info!(policy_id, event_id = id, "policy replication requested");
        Ok(id)
    }

    /// Request an ad hoc transfer of `repository` on behalf of `actor`.
    ///
    /// Every call enqueues independently.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::EmptyRepository`],
    /// [`TriggerError::UntaggedRepository`] or
    /// [`TriggerError::SinglePullUnavailable`].
    pub fn trigger_single_pull(&self, repository: &str, actor: &str) -> TriggerResult<EventId> {
        let repository = repository.trim();
        if repository.is_empty() {
            return Err(TriggerError::EmptyRepository);
        }
        if FilterCandidate::transfer(repository, None).split().is_err() {
            return Err(TriggerError::UntaggedRepository {
                value: repository.to_string(),
            });
        }
        let source = self
            .single_pull
            .as_ref()
            .ok_or(TriggerError::SinglePullUnavailable)?;

        let id = self.publish(Event::ReplicationRequested {
            policy_id: AD_HOC_POLICY_ID,
            metadata: Some(PullMetadata {
                url: Some(source.url.clone()),
                insecure: source.insecure,
                repository: Some(repository.to_string()),
                pull_username: Some(actor.to_string()),
            }),
        });
        info!(repository, actor, event_id = id, "single pull requested");
        Ok(id)
    }

    fn publish(&self, event: Event) -> EventId {
        self.metrics.inc_event(event.kind());
        self.events.publish(event)
    }
}
