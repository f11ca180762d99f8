//! Shared fixtures for handler tests.

use std::sync::{Arc, OnceLock};

use tagrelay_config::{Account, RelayConfig, Role, hash_secret};
use tagrelay_core::{PolicyDraft, ReplicationTarget};
use tagrelay_events::EventBus;
use tagrelay_replication::{
    EngineSettings, PullController, PullReplicator, Replicator, SinglePullSource, TriggerService,
};
use tagrelay_telemetry::Metrics;
use tagrelay_test_support::{MemoryPolicyStore, RecordingLedger, RecordingTaskClient};

use crate::http::auth::Actor;
use crate::proxy::PullProxy;
use crate::state::{ApiDependencies, ApiState};

pub(crate) const ADMIN: &str = "admin";
pub(crate) const ADMIN_SECRET: &str = "admin-secret";
pub(crate) const USER: &str = "alice";
pub(crate) const USER_SECRET: &str = "alice-secret";
pub(crate) const JOBSERVICE_SECRET: &str = "js-secret";

fn hashes() -> &'static (String, String) {
    static HASHES: OnceLock<(String, String)> = OnceLock::new();
    HASHES.get_or_init(|| {
        (
            hash_secret(ADMIN_SECRET).expect("hash admin secret"),
            hash_secret(USER_SECRET).expect("hash user secret"),
        )
    })
}

pub(crate) fn relay_config(upstream: Option<&str>) -> RelayConfig {
    let (admin_hash, user_hash) = hashes().clone();
    let mut config = RelayConfig {
        internal_base_url: Some("http://relay.internal:8080".into()),
        external_endpoint: Some("https://relay.example".into()),
        accounts: vec![
            Account {
                username: ADMIN.into(),
                secret_hash: admin_hash,
                role: Role::Admin,
            },
            Account {
                username: USER.into(),
                secret_hash: user_hash,
                role: Role::User,
            },
        ],
        ..RelayConfig::default()
    };
    config.remote_pull.upstream_url = upstream.map(str::to_string);
    config.remote_pull.secret = "S".into();
    config.jobservice.secret = JOBSERVICE_SECRET.into();
    config
}

pub(crate) fn admin() -> Actor {
    Actor {
        username: ADMIN.into(),
        role: Role::Admin,
    }
}

pub(crate) fn user() -> Actor {
    Actor {
        username: USER.into(),
        role: Role::User,
    }
}

pub(crate) fn draft(name: &str) -> PolicyDraft {
    PolicyDraft {
        name: name.into(),
        description: String::new(),
        source: ReplicationTarget {
            url: "https://source.example".into(),
            insecure: false,
        },
        repositories: vec!["library/alpine:3.19".into()],
        enabled: true,
    }
}

pub(crate) struct Harness {
    pub(crate) ledger: Arc<RecordingLedger>,
    pub(crate) store: Arc<MemoryPolicyStore>,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
    state: Arc<ApiState>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::build(None)
    }

    pub(crate) fn with_upstream(upstream: &str) -> Self {
        Self::build(Some(upstream))
    }

    fn build(upstream: Option<&str>) -> Self {
        let config = Arc::new(relay_config(upstream));
        let ledger = Arc::new(RecordingLedger::new());
        let store = Arc::new(MemoryPolicyStore::new());
        let tasks = Arc::new(RecordingTaskClient::new());
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");

        let replicator = Replicator::Pull(PullReplicator::new(
            ledger.clone(),
            tasks,
            EngineSettings {
                internal_base_url: "http://relay.internal:8080".into(),
                external_endpoint: config.external_endpoint.clone(),
            },
            metrics.clone(),
        ));
        let controller = Arc::new(PullController::new(
            replicator,
            store.clone(),
            ledger.clone(),
        ));
        let single_pull = config
            .remote_pull
            .upstream_url
            .clone()
            .map(|url| SinglePullSource {
                url,
                insecure: config.remote_pull.source_insecure,
            });
        let triggers = Arc::new(TriggerService::new(
            store.clone(),
            ledger.clone(),
            events.clone(),
            metrics.clone(),
            single_pull,
        ));
        let proxy = PullProxy::from_config(&config.remote_pull);

        let state = Arc::new(ApiState::new(ApiDependencies {
            config,
            controller,
            triggers,
            ledger: ledger.clone(),
            events: events.clone(),
            metrics: metrics.clone(),
            proxy,
        }));

        Self {
            ledger,
            store,
            events,
            metrics,
            state,
        }
    }

    pub(crate) fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }
}
