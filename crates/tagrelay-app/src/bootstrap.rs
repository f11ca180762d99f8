//! Boot sequence: configuration, logging, database, replication services,
//! orchestrator and the API listener.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tagrelay_api::{ApiDependencies, ApiServer, PullProxy};
use tagrelay_config::{RelayConfig, RemotePullConfig, ServerConfig};
use tagrelay_core::{JobLedger, PolicyStore, TaskClient};
use tagrelay_data::{PgJobLedger, PgPolicyStore};
use tagrelay_events::EventBus;
use tagrelay_replication::{
    EngineSettings, HttpTaskClient, PullController, PullReplicator, Replicator, SinglePullSource,
    TriggerService,
};
use tagrelay_telemetry::{LogFormat, LoggingConfig, Metrics};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::orchestrator::ReplicationOrchestrator;

const DATABASE_MAX_CONNECTIONS: u32 = 10;
const BUILD_SHA: &str = match option_env!("TAGRELAY_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Dependencies required to bootstrap tagrelay.
pub(crate) struct BootstrapDependencies {
    config: Arc<RelayConfig>,
    events: EventBus,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = RelayConfig::load().map_err(|err| AppError::config("config.load", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config: Arc::new(config),
            events: EventBus::new(),
            telemetry,
        })
    }
}

/// Services assembled on top of the storage and job-service collaborators.
pub(crate) struct Services {
    pub(crate) api: ApiDependencies,
    pub(crate) controller: Arc<PullController>,
}

impl Services {
    pub(crate) fn assemble(
        config: &Arc<RelayConfig>,
        ledger: Arc<dyn JobLedger>,
        policies: Arc<dyn PolicyStore>,
        tasks: Arc<dyn TaskClient>,
        events: &EventBus,
        telemetry: &Metrics,
    ) -> AppResult<Self> {
        let internal_base_url =
            config
                .internal_base_url
                .clone()
                .ok_or(AppError::MissingConfig {
                    field: "internal_base_url",
                })?;
        let replicator = Replicator::Pull(PullReplicator::new(
            Arc::clone(&ledger),
            tasks,
            EngineSettings {
                internal_base_url,
                external_endpoint: config.external_endpoint.clone(),
            },
            telemetry.clone(),
        ));
        let controller = Arc::new(PullController::new(
            replicator,
            Arc::clone(&policies),
            Arc::clone(&ledger),
        ));
        let triggers = Arc::new(TriggerService::new(
            policies,
            Arc::clone(&ledger),
            events.clone(),
            telemetry.clone(),
            single_pull_source(&config.remote_pull),
        ));

        let proxy = PullProxy::from_config(&config.remote_pull);
        if let PullProxy::Disabled { reason } = &proxy {
            warn!(reason = %reason, "remote pull proxy disabled");
        }

        Ok(Self {
            api: ApiDependencies {
                config: Arc::clone(config),
                controller: Arc::clone(&controller),
                triggers,
                ledger,
                events: events.clone(),
                metrics: telemetry.clone(),
                proxy,
            },
            controller,
        })
    }
}

/// Entry point for the tagrelay boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or application startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        events,
        telemetry,
    } = dependencies;

    tagrelay_telemetry::init_logging(&LoggingConfig {
        level: &config.logging.level,
        format: LogFormat::from_setting(config.logging.format.as_deref()),
        build_sha: BUILD_SHA,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!("tagrelay bootstrap starting");

    let database_url = config
        .database_url
        .as_deref()
        .ok_or(AppError::MissingConfig {
            field: "database_url",
        })?;
    let pool = PgPoolOptions::new()
        .max_connections(DATABASE_MAX_CONNECTIONS)
        .connect(database_url)
        .await
        .map_err(|err| AppError::database("database.connect", err))?;
    tagrelay_data::migrate(&pool)
        .await
        .map_err(|err| AppError::data("database.migrate", err))?;
    info!("database ready");

    let ledger: Arc<dyn JobLedger> = Arc::new(PgJobLedger::new(pool.clone()));
    let policies: Arc<dyn PolicyStore> = Arc::new(PgPolicyStore::new(pool));
    let tasks: Arc<dyn TaskClient> = Arc::new(job_service_client(&config)?);

    let Services { api, controller } =
        Services::assemble(&config, ledger, policies, tasks, &events, &telemetry)?;

    let orchestrator =
        Arc::new(ReplicationOrchestrator::new(controller, events, telemetry)).spawn();
    info!("replication orchestrator ready");

    let addr = listen_addr(&config.server)?;
    let serve_result = ApiServer::new(api).serve(addr, shutdown_signal()).await;

    if !orchestrator.is_finished() {
        orchestrator.abort();
    }
    if let Err(err) = orchestrator.await
        && !err.is_cancelled()
    {
        warn!(error = %err, "replication orchestrator join failed");
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

pub(crate) fn job_service_client(config: &RelayConfig) -> AppResult<HttpTaskClient> {
    let url = config
        .jobservice
        .url
        .as_deref()
        .ok_or(AppError::MissingConfig {
            field: "jobservice.url",
        })?;
    HttpTaskClient::new(
        url,
        &config.remote_pull.secret_prefix,
        &config.jobservice.secret,
        config.jobservice.timeout(),
    )
    .map_err(|err| AppError::job_service("jobservice.client", err))
}

pub(crate) fn single_pull_source(remote_pull: &RemotePullConfig) -> Option<SinglePullSource> {
    remote_pull
        .upstream_url
        .clone()
        .map(|url| SinglePullSource {
            url,
            insecure: remote_pull.source_insecure,
        })
}

pub(crate) fn listen_addr(server: &ServerConfig) -> AppResult<SocketAddr> {
    if server.http_port == 0 {
        return Err(AppError::InvalidConfig {
            field: "http_port",
            reason: "zero",
            value: Some(server.http_port.to_string()),
        });
    }
    Ok(SocketAddr::new(server.bind_addr, server.http_port))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
