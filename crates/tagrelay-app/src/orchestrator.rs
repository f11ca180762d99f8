//! Replication orchestrator: consumes start-replication events from the bus
//! and drives the controller, one task per request.

use std::sync::Arc;

use tagrelay_core::PullMetadata;
use tagrelay_events::{Event, EventBus, EventBusError, EventId};
use tagrelay_replication::PullController;
use tagrelay_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{error, info, warn};

pub(crate) struct ReplicationOrchestrator {
    controller: Arc<PullController>,
    events: EventBus,
    metrics: Metrics,
}

impl ReplicationOrchestrator {
    pub(crate) const fn new(
        controller: Arc<PullController>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            controller,
            events,
            metrics,
        }
    }

    /// Subscribe to the bus and start dispatching requests.
    ///
    /// The subscription is taken before the worker is spawned so requests
    /// published after this returns are never missed. When the live channel
    /// lags, skipped requests are recovered from the replay ring.
    pub(crate) fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut last_seen = self.events.last_event_id().unwrap_or(0);
        let mut stream = self.events.subscribe(Some(last_seen));
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(envelope) => {
                        if envelope.id > last_seen {
                            last_seen = envelope.id;
                            self.dispatch(envelope.event);
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        last_seen = self.recover(skipped, last_seen);
                    }
                }
            }
            info!("replication orchestrator stopped");
        })
    }

    /// Dispatch everything after `last_seen` still held by the replay ring and
    /// return the new high-water mark. Live copies of these events are skipped
    /// by the caller.
    fn recover(self: &Arc<Self>, skipped: u64, last_seen: EventId) -> EventId {
        let missed = self.events.backlog_since(last_seen);
        let lost = missed
            .first()
            .map_or(0, |envelope| envelope.id.saturating_sub(last_seen + 1));
        if lost > 0 {
            let err = EventBusError::Lagged {
                skipped: lost,
                last_seen: Some(last_seen),
            };
            warn!(
                skipped = err.skipped(),
                last_seen,
                error = %err,
                "replication requests dropped"
            );
        }
        info!(
            skipped,
            recovered = missed.len(),
            last_seen,
            "recovering replication requests after lag"
        );

        let mut high_water = last_seen;
        for envelope in missed {
            high_water = envelope.id;
            self.dispatch(envelope.event);
        }
        high_water
    }

    fn dispatch(self: &Arc<Self>, event: Event) {
        if let Event::ReplicationRequested {
            policy_id,
            metadata,
        } = event
        {
            let orchestrator = Arc::clone(self);
            tokio::spawn(async move {
                orchestrator.handle(policy_id, metadata.as_ref()).await;
            });
        }
    }

    async fn handle(&self, policy_id: i64, metadata: Option<&PullMetadata>) {
        let outcome = if metadata.is_none() && policy_id >= 0 {
            self.controller.replicate_policy(policy_id).await
        } else {
            self.controller.replicate(policy_id, metadata).await
        };

        match outcome {
            Ok(job_ids) => {
                info!(policy_id, jobs = job_ids.len(), "replication submitted");
            }
            Err(err) => {
                error!(policy_id, error = %err, "replication failed");
                let event = Event::ReplicationFailed {
                    policy_id,
                    message: err.to_string(),
                };
                self.metrics.inc_event(event.kind());
                let _ = self.events.publish(event);
            }
        }
    }
}
