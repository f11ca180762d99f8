//! Shared handler state and degraded-component tracking.

use std::sync::{Arc, Mutex, MutexGuard};

use tagrelay_config::RelayConfig;
use tagrelay_core::JobLedger;
use tagrelay_events::{Event, EventBus};
use tagrelay_replication::{PullController, TriggerService};
use tagrelay_telemetry::Metrics;
use tracing::warn;

use crate::proxy::PullProxy;

/// Collaborators the HTTP surface is built from, constructed once at startup.
pub struct ApiDependencies {
    /// Validated service configuration (accounts, secrets).
    pub config: Arc<RelayConfig>,
    /// Replication controller used for policy management.
    pub controller: Arc<PullController>,
    /// Trigger entry points.
    pub triggers: Arc<TriggerService>,
    /// Job ledger used for listings, status callbacks and health probes.
    pub ledger: Arc<dyn JobLedger>,
    /// Event bus shared with the orchestrator.
    pub events: EventBus,
    /// Prometheus registry.
    pub metrics: Metrics,
    /// Pull proxy resolved from configuration.
    pub proxy: PullProxy,
}

pub(crate) struct ApiState {
    pub(crate) config: Arc<RelayConfig>,
    pub(crate) controller: Arc<PullController>,
    pub(crate) triggers: Arc<TriggerService>,
    pub(crate) ledger: Arc<dyn JobLedger>,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
    pub(crate) proxy: PullProxy,
    health_status: Mutex<Vec<String>>,
}

impl ApiState {
    pub(crate) fn new(deps: ApiDependencies) -> Self {
        let ApiDependencies {
            config,
            controller,
            triggers,
            ledger,
            events,
            metrics,
            proxy,
        } = deps;
        Self {
            config,
            controller,
            triggers,
            ledger,
            events,
            telemetry: metrics,
            proxy,
            health_status: Mutex::new(Vec::new()),
        }
    }

    /// Publish an event and count it.
    pub(crate) fn publish(&self, event: Event) -> u64 {
        self.telemetry.inc_event(event.kind());
        self.events.publish(event)
    }

    pub(crate) fn add_degraded_component(&self, component: &str) -> bool {
        let mut guard = self.lock_health();
        if guard.iter().any(|entry| entry == component) {
            return false;
        }
        guard.push(component.to_string());
        guard.sort();
        let snapshot = guard.clone();
        drop(guard);
        warn!(component, "component degraded");
        let _ = self.publish(Event::HealthChanged { degraded: snapshot });
        true
    }

    pub(crate) fn remove_degraded_component(&self, component: &str) -> bool {
        let mut guard = self.lock_health();
        let previous = guard.len();
        guard.retain(|entry| entry != component);
        if guard.len() == previous {
            return false;
        }
        let snapshot = guard.clone();
        drop(guard);
        let _ = self.publish(Event::HealthChanged { degraded: snapshot });
        true
    }

    pub(crate) fn current_health_degraded(&self) -> Vec<String> {
        self.lock_health().clone()
    }

    fn lock_health(&self) -> MutexGuard<'_, Vec<String>> {
        self.health_status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_harness::Harness;

    #[test]
    fn degraded_components_publish_transitions_once() {
        let harness = Harness::new();
        let state = harness.state();

        assert!(state.add_degraded_component("database"));
        assert!(!state.add_degraded_component("database"));
        assert_eq!(state.current_health_degraded(), vec!["database".to_string()]);
        assert!(state.remove_degraded_component("database"));
        assert!(!state.remove_degraded_component("database"));
        assert!(state.current_health_degraded().is_empty());

        // One event per transition.
        assert_eq!(harness.events.backlog_since(0).len(), 2);
    }
}
