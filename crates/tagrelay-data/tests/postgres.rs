use std::future::Future;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tagrelay_core::{
    JobLedger, JobQuery, JobStatus, NewRepJob, Operation, PolicyDraft, PolicyStore,
    ReplicationTarget,
};
use tagrelay_data::{PgJobLedger, PgPolicyStore, migrate};
use tagrelay_test_support::postgres::start_postgres;

async fn with_stores<F, Fut>(test: F) -> Result<()>
where
    F: FnOnce(PgJobLedger, PgPolicyStore) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let database = match start_postgres() {
        Ok(database) => database,
        Err(err) => {
            eprintln!("skipping postgres tests: {err:#}");
            return Ok(());
        }
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database.connection_string())
        .await?;
    migrate(&pool).await?;
    let result = test(PgJobLedger::new(pool.clone()), PgPolicyStore::new(pool.clone())).await;
    pool.close().await;
    result
}

fn new_job(policy_id: i64, repository: &str) -> NewRepJob {
    NewRepJob {
        policy_id,
        repository: repository.into(),
        tags: vec!["1.0".into(), "1.1".into()],
        operation: Operation::Transfer,
    }
}

#[tokio::test]
async fn ledger_tracks_status_and_external_ids() -> Result<()> {
    with_stores(|ledger, _| async move {
        let first = ledger.create_job(new_job(4, "library/a")).await?;
        let second = ledger.create_job(new_job(4, "library/b")).await?;
        ledger.create_job(new_job(-1, "library/c")).await?;

        ledger.set_external_id(first, "task-1").await?;
        assert!(ledger.update_status(second, JobStatus::Finished).await?);
        assert!(!ledger.update_status(9_999, JobStatus::Error).await?);

        assert_eq!(ledger.count_jobs(&JobQuery::in_flight(4)).await?, 1);
        assert_eq!(ledger.count_jobs(&JobQuery::default()).await?, 3);

        let listed = ledger
            .list_jobs(&JobQuery {
                policy_id: Some(4),
                statuses: Vec::new(),
            })
            .await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);

        let job = ledger.get_job(first).await?.expect("row exists");
        assert_eq!(job.external_id.as_deref(), Some("task-1"));
        assert_eq!(job.tags, vec!["1.0", "1.1"]);
        assert_eq!(job.status, JobStatus::Pending);
        ledger.ping().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn policy_store_round_trips() -> Result<()> {
    with_stores(|_, store| async move {
        let draft = PolicyDraft {
            name: "nightly".into(),
            description: "mirror hub".into(),
            source: ReplicationTarget {
                url: "https://hub.example".into(),
                insecure: true,
            },
            repositories: vec!["library/app:1.0".into()],
            enabled: true,
        };
        let created = store.create_policy(&draft).await?;
        assert!(created.source.insecure);

        let mut changed = draft.clone();
        changed.enabled = false;
        let updated = store
            .update_policy(created.id, &changed)
            .await?
            .expect("policy exists");
        assert!(!updated.enabled);
        assert!(store.update_policy(9_999, &changed).await?.is_none());

        assert_eq!(store.list_policies().await?.len(), 1);
        assert!(store.remove_policy(created.id).await?);
        assert!(store.get_policy(created.id).await?.is_none());
        Ok(())
    })
    .await
}
