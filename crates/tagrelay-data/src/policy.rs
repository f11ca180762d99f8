//! Policy store backed by the `replication_policy` table.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tagrelay_core::{PolicyDraft, PolicyStore, ReplicationPolicy, ReplicationTarget};

use crate::error::{Result, query_failed};

const LIST_POLICIES: &str = r"
    SELECT id, name, description, source_url, source_insecure, repositories, enabled, created_at, updated_at
    FROM replication_policy
    ORDER BY id
";

const GET_POLICY: &str = r"
    SELECT id, name, description, source_url, source_insecure, repositories, enabled, created_at, updated_at
    FROM replication_policy
    WHERE id = $1
";

const INSERT_POLICY: &str = r"
    INSERT INTO replication_policy (name, description, source_url, source_insecure, repositories, enabled)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id, name, description, source_url, source_insecure, repositories, enabled, created_at, updated_at
";

const UPDATE_POLICY: &str = r"
    UPDATE replication_policy
    SET name = $2,
        description = $3,
        source_url = $4,
        source_insecure = $5,
        repositories = $6,
        enabled = $7,
        updated_at = now()
    WHERE id = $1
    RETURNING id, name, description, source_url, source_insecure, repositories, enabled, created_at, updated_at
";

const DELETE_POLICY: &str = r"DELETE FROM replication_policy WHERE id = $1";

/// PostgreSQL implementation of [`PolicyStore`].
#[derive(Clone)]
pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    /// Wrap an existing pool; run [`crate::migrate`] first.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List every policy ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> Result<Vec<ReplicationPolicy>> {
        let rows = sqlx::query(LIST_POLICIES)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("policy.list"))?;
        rows.iter().map(decode_policy).collect()
    }

    /// Fetch a single policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn fetch(&self, policy_id: i64) -> Result<Option<ReplicationPolicy>> {
        let row = sqlx::query(GET_POLICY)
            .bind(policy_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("policy.fetch"))?;
        row.as_ref().map(decode_policy).transpose()
    }

    /// Insert a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, draft: &PolicyDraft) -> Result<ReplicationPolicy> {
        let row = sqlx::query(INSERT_POLICY)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(&draft.source.url)
            .bind(draft.source.insecure)
            .bind(&draft.repositories)
            .bind(draft.enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("policy.insert"))?;
        decode_policy(&row)
    }

    /// Replace a policy, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn replace(
        &self,
        policy_id: i64,
        draft: &PolicyDraft,
    ) -> Result<Option<ReplicationPolicy>> {
        let row = sqlx::query(UPDATE_POLICY)
            .bind(policy_id)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(&draft.source.url)
            .bind(draft.source.insecure)
            .bind(&draft.repositories)
            .bind(draft.enabled)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("policy.replace"))?;
        row.as_ref().map(decode_policy).transpose()
    }

    /// Delete a policy, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, policy_id: i64) -> Result<bool> {
        let result = sqlx::query(DELETE_POLICY)
            .bind(policy_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed("policy.delete"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn decode_policy(row: &PgRow) -> Result<ReplicationPolicy> {
    Ok(ReplicationPolicy {
        id: row.try_get("id").map_err(query_failed("decode.id"))?,
        name: row.try_get("name").map_err(query_failed("decode.name"))?,
        description: row
            .try_get("description")
            .map_err(query_failed("decode.description"))?,
        source: ReplicationTarget {
            url: row
                .try_get("source_url")
                .map_err(query_failed("decode.source_url"))?,
            insecure: row
                .try_get("source_insecure")
                .map_err(query_failed("decode.source_insecure"))?,
        },
        repositories: row
            .try_get("repositories")
            .map_err(query_failed("decode.repositories"))?,
        enabled: row.try_get("enabled").map_err(query_failed("decode.enabled"))?,
        created_at: row
            .try_get("created_at")
            .map_err(query_failed("decode.created_at"))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(query_failed("decode.updated_at"))?,
    })
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn list_policies(&self) -> anyhow::Result<Vec<ReplicationPolicy>> {
        Ok(self.list().await?)
    }

    async fn get_policy(&self, policy_id: i64) -> anyhow::Result<Option<ReplicationPolicy>> {
        Ok(self.fetch(policy_id).await?)
    }

    async fn create_policy(&self, draft: &PolicyDraft) -> anyhow::Result<ReplicationPolicy> {
        Ok(self.insert(draft).await?)
    }

    async fn update_policy(
        &self,
        policy_id: i64,
        draft: &PolicyDraft,
    ) -> anyhow::Result<Option<ReplicationPolicy>> {
        Ok(self.replace(policy_id, draft).await?)
    }

    async fn remove_policy(&self, policy_id: i64) -> anyhow::Result<bool> {
        Ok(self.delete(policy_id).await?)
    }
}
