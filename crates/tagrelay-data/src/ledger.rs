//! Job ledger backed by the `replication_job` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tagrelay_core::{JobLedger, JobQuery, JobStatus, NewRepJob, Operation, RepJob};
use tracing::debug;

use crate::error::{DataError, Result, query_failed};

const INSERT_JOB: &str = r"
    INSERT INTO replication_job (policy_id, repository, tags, operation, status)
    VALUES ($1, $2, $3, $4, 'pending')
    RETURNING id
";

const UPDATE_STATUS: &str = r"
    UPDATE replication_job
    SET status = $2, updated_at = now()
    WHERE id = $1
";

const SET_EXTERNAL_ID: &str = r"
    UPDATE replication_job
    SET external_id = $2, updated_at = now()
    WHERE id = $1
";

const COUNT_JOBS: &str = r"
    SELECT COUNT(*) AS total
    FROM replication_job
    WHERE ($1::BIGINT IS NULL OR policy_id = $1)
      AND (cardinality($2::TEXT[]) = 0 OR status = ANY($2))
";

const LIST_JOBS: &str = r"
    SELECT id, policy_id, repository, tags, operation, external_id, status, created_at, updated_at
    FROM replication_job
    WHERE ($1::BIGINT IS NULL OR policy_id = $1)
      AND (cardinality($2::TEXT[]) = 0 OR status = ANY($2))
    ORDER BY id DESC
";

const GET_JOB: &str = r"
    SELECT id, policy_id, repository, tags, operation, external_id, status, created_at, updated_at
    FROM replication_job
    WHERE id = $1
";

/// PostgreSQL implementation of [`JobLedger`].
#[derive(Clone)]
pub struct PgJobLedger {
    pool: PgPool,
}

impl PgJobLedger {
    /// Wrap an existing pool; run [`crate::migrate`] first.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, job: &NewRepJob) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(INSERT_JOB)
            .bind(job.policy_id)
            .bind(&job.repository)
            .bind(&job.tags)
            .bind(job.operation.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("ledger.insert"))?;
        debug!(job_id = id, policy_id = job.policy_id, "ledger row created");
        Ok(id)
    }

    /// Set the status of a row, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_status(&self, job_id: i64, status: JobStatus) -> Result<bool> {
        let result = sqlx::query(UPDATE_STATUS)
            .bind(job_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(query_failed("ledger.set_status"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the job-service identifier of a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails or the row does not exist.
    pub async fn attach(&self, job_id: i64, external_id: &str) -> Result<()> {
        let result = sqlx::query(SET_EXTERNAL_ID)
            .bind(job_id)
            .bind(external_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("ledger.attach"))?;
        if result.rows_affected() == 0 {
            return Err(query_failed("ledger.attach")(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    /// Count rows matching the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count(&self, query: &JobQuery) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(COUNT_JOBS)
            .bind(query.policy_id)
            .bind(status_names(query))
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("ledger.count"))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// List rows matching the query, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list(&self, query: &JobQuery) -> Result<Vec<RepJob>> {
        let rows = sqlx::query(LIST_JOBS)
            .bind(query.policy_id)
            .bind(status_names(query))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("ledger.list"))?;
        rows.iter().map(decode_job).collect()
    }

    /// Fetch a single row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn fetch(&self, job_id: i64) -> Result<Option<RepJob>> {
        let row = sqlx::query(GET_JOB)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("ledger.fetch"))?;
        row.as_ref().map(decode_job).transpose()
    }
}

fn status_names(query: &JobQuery) -> Vec<String> {
    query
        .statuses
        .iter()
        .map(|status| status.as_str().to_string())
        .collect()
}

fn decode_job(row: &PgRow) -> Result<RepJob> {
    let operation: String = row.try_get("operation").map_err(query_failed("decode.operation"))?;
    let status: String = row.try_get("status").map_err(query_failed("decode.status"))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(query_failed("decode.created_at"))?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(query_failed("decode.updated_at"))?;
    Ok(RepJob {
        id: row.try_get("id").map_err(query_failed("decode.id"))?,
        policy_id: row.try_get("policy_id").map_err(query_failed("decode.policy_id"))?,
        repository: row.try_get("repository").map_err(query_failed("decode.repository"))?,
        tags: row.try_get("tags").map_err(query_failed("decode.tags"))?,
        operation: Operation::parse(&operation).ok_or(DataError::InvalidValue {
            column: "operation",
            value: operation.clone(),
        })?,
        external_id: row.try_get("external_id").map_err(query_failed("decode.external_id"))?,
        status: JobStatus::parse(&status).ok_or(DataError::InvalidValue {
            column: "status",
            value: status.clone(),
        })?,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl JobLedger for PgJobLedger {
    async fn create_job(&self, job: NewRepJob) -> anyhow::Result<i64> {
        Ok(self.insert(&job).await?)
    }

    async fn update_status(&self, job_id: i64, status: JobStatus) -> anyhow::Result<bool> {
        Ok(self.set_status(job_id, status).await?)
    }

    async fn set_external_id(&self, job_id: i64, external_id: &str) -> anyhow::Result<()> {
        Ok(self.attach(job_id, external_id).await?)
    }

    async fn count_jobs(&self, query: &JobQuery) -> anyhow::Result<u64> {
        Ok(self.count(query).await?)
    }

    async fn list_jobs(&self, query: &JobQuery) -> anyhow::Result<Vec<RepJob>> {
        Ok(self.list(query).await?)
    }

    async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<RepJob>> {
        Ok(self.fetch(job_id).await?)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(query_failed("ledger.ping"))?;
        Ok(())
    }
}
