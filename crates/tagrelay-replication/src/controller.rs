//! Replication controller: validates requests at the boundary and delegates
//! to the replicator engine. Also fronts policy storage.

use std::sync::Arc;

use tagrelay_core::{
    JobLedger, JobQuery, PolicyDraft, PolicyStore, PullMetadata, PullRequest, ReplicationError,
    ReplicationPolicy, ReplicationResult,
};
use tracing::info;

use crate::engine::Replicator;

/// Entry point for replication requests and policy management.
pub struct PullController {
    replicator: Replicator,
    policies: Arc<dyn PolicyStore>,
    ledger: Arc<dyn JobLedger>,
}

impl PullController {
    /// Construct a controller over the engine and storage collaborators.
    #[must_use]
    pub fn new(
        replicator: Replicator,
        policies: Arc<dyn PolicyStore>,
        ledger: Arc<dyn JobLedger>,
    ) -> Self {
        Self {
            replicator,
            policies,
            ledger,
        }
    }

    /// Replicate a single ad hoc pull described by `metadata`.
    ///
    /// # Errors
    ///
    /// Returns `metadata not found`, `target not found` or `repository not found`
    /// before touching the ledger, or any engine failure.
    pub async fn replicate(
        &self,
        policy_id: i64,
        metadata: Option<&PullMetadata>,
    ) -> ReplicationResult<Vec<i64>> {
        let request = PullRequest::from_metadata(metadata)?;
        self.replicator
            .replicate(&request.into_replication(policy_id))
            .await
    }

    /// Replicate every reference of a stored policy from its source.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::PolicyNotFound`] or
    /// [`ReplicationError::PolicyDisabled`], or any engine failure.
    pub async fn replicate_policy(&self, policy_id: i64) -> ReplicationResult<Vec<i64>> {
        let policy = self.get_policy(policy_id).await?;
        if !policy.enabled {
            return Err(ReplicationError::PolicyDisabled { policy_id });
        }
        self.replicator.replicate(&policy.to_replication()).await
    }

    /// List stored policies.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy store fails.
    pub async fn list_policies(&self) -> ReplicationResult<Vec<ReplicationPolicy>> {
        self.policies
            .list_policies()
            .await
            .map_err(ReplicationError::policy_store("list_policies"))
    }

    /// Fetch a stored policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::PolicyNotFound`] or a store failure.
    pub async fn get_policy(&self, policy_id: i64) -> ReplicationResult<ReplicationPolicy> {
        self.policies
            .get_policy(policy_id)
            .await
            .map_err(ReplicationError::policy_store("get_policy"))?
            .ok_or(ReplicationError::PolicyNotFound { policy_id })
    }

    /// Validate and persist a new policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::InvalidPolicy`] or a store failure.
    pub async fn create_policy(&self, draft: &PolicyDraft) -> ReplicationResult<ReplicationPolicy> {
        draft.validate()?;
        let policy = self
            .policies
            .create_policy(draft)
            .await
            .map_err(ReplicationError::policy_store("create_policy"))?;
        info!(policy_id = policy.id, name = %policy.name, "replication policy created");
        Ok(policy)
    }

    /// Validate and replace an existing policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::InvalidPolicy`],
    /// [`ReplicationError::PolicyNotFound`] or a store failure.
    pub async fn update_policy(
        &self,
        policy_id: i64,
        draft: &PolicyDraft,
    ) -> ReplicationResult<ReplicationPolicy> {
        draft.validate()?;
        let policy = self
            .policies
            .update_policy(policy_id, draft)
            .await
            .map_err(ReplicationError::policy_store("update_policy"))?
            .ok_or(ReplicationError::PolicyNotFound { policy_id })?;
        info!(policy_id, "replication policy updated");
        Ok(policy)
    }

    /// Delete a policy that has no jobs in flight.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::PolicyBusy`],
    /// [`ReplicationError::PolicyNotFound`] or a collaborator failure.
    pub async fn remove_policy(&self, policy_id: i64) -> ReplicationResult<()> {
        let in_flight = self
            .ledger
            .count_jobs(&JobQuery::in_flight(policy_id))
            .await
            .map_err(ReplicationError::ledger("count_jobs"))?;
        if in_flight > 0 {
            return Err(ReplicationError::PolicyBusy { policy_id });
        }
        let removed = self
            .policies
            .remove_policy(policy_id)
            .await
            .map_err(ReplicationError::policy_store("remove_policy"))?;
        if !removed {
            return Err(ReplicationError::PolicyNotFound { policy_id });
        }
        info!(policy_id, "replication policy removed");
        Ok(())
    }
}
