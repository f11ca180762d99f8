//! Replication trigger endpoints.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use tracing::info;

use crate::http::auth::Actor;
use crate::http::errors::ApiError;
use crate::models::{ReplicationAccepted, ReplicationTriggerRequest, SinglePullRequest};
use crate::state::ApiState;

/// `POST /api/replications`: queue a run of a stored policy.
pub(crate) async fn trigger_policy(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<ReplicationTriggerRequest>,
) -> Result<Json<ReplicationAccepted>, ApiError> {
    actor.require_privileged()?;
    let event_id = state.triggers.trigger_policy(request.policy_id).await?;
    info!(
        policy_id = request.policy_id,
        actor = %actor.username,
        event_id,
        "policy replication accepted"
    );
    Ok(Json(ReplicationAccepted { event_id }))
}

/// `POST /api/replications/pull/single`: queue an ad hoc transfer for the caller.
pub(crate) async fn trigger_single_pull(
    State(state): State<Arc<ApiState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<SinglePullRequest>,
) -> Result<Json<ReplicationAccepted>, ApiError> {
    let event_id = state
        .triggers
        .trigger_single_pull(&request.repository, &actor.username)?;
    Ok(Json(ReplicationAccepted { event_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tagrelay_core::{AD_HOC_POLICY_ID, JobStatus, NewRepJob, Operation, PullMetadata};
    use tagrelay_events::Event;

    use crate::test_harness::{Harness, admin, draft, user};

    #[tokio::test]
    async fn policy_trigger_publishes_request() {
        let harness = Harness::new();
        let policy = harness.store.insert(&draft("nightly"));

        let Json(accepted) = trigger_policy(
            State(harness.state()),
            Extension(admin()),
            Json(ReplicationTriggerRequest {
                policy_id: policy.id,
            }),
        )
        .await
        .expect("accepted");

        let backlog = harness.events.backlog_since(0);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, accepted.event_id);
        assert_eq!(
            backlog[0].event,
            Event::ReplicationRequested {
                policy_id: policy.id,
                metadata: None,
            }
        );
    }

    #[tokio::test]
    async fn policy_trigger_with_pending_job_is_precondition_failed() {
        let harness = Harness::new();
        let policy = harness.store.insert(&draft("nightly"));
        harness.ledger.seed(
            NewRepJob {
                policy_id: policy.id,
                repository: "library/alpine".into(),
                tags: vec!["3.19".into()],
                operation: Operation::Transfer,
            },
            JobStatus::Pending,
        );

        let err = trigger_policy(
            State(harness.state()),
            Extension(admin()),
            Json(ReplicationTriggerRequest {
                policy_id: policy.id,
            }),
        )
        .await
        .expect_err("jobs in flight");

        assert_eq!(err.status, StatusCode::PRECONDITION_FAILED);
        assert!(harness.events.backlog_since(0).is_empty());
    }

    #[tokio::test]
    async fn policy_trigger_for_unknown_policy_is_not_found() {
        let harness = Harness::new();
        let err = trigger_policy(
            State(harness.state()),
            Extension(admin()),
            Json(ReplicationTriggerRequest { policy_id: 404 }),
        )
        .await
        .expect_err("unknown policy");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn policy_trigger_requires_privileged_role() {
        let harness = Harness::new();
        let policy = harness.store.insert(&draft("nightly"));
        let err = trigger_policy(
            State(harness.state()),
            Extension(user()),
            Json(ReplicationTriggerRequest {
                policy_id: policy.id,
            }),
        )
        .await
        .expect_err("forbidden");

        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(harness.events.backlog_since(0).is_empty());
    }

    #[tokio::test]
    async fn single_pull_carries_caller_identity() {
        let harness = Harness::with_upstream("https://upstream.example/v2");
        let user = user();

        let _ = trigger_single_pull(
            State(harness.state()),
            Extension(user.clone()),
            Json(SinglePullRequest {
                repository: "library/alpine:3.19".into(),
            }),
        )
        .await
        .expect("accepted");

        let backlog = harness.events.backlog_since(0);
        assert_eq!(
            backlog[0].event,
            Event::ReplicationRequested {
                policy_id: AD_HOC_POLICY_ID,
                metadata: Some(PullMetadata {
                    url: Some("https://upstream.example/v2".into()),
                    insecure: false,
                    repository: Some("library/alpine:3.19".into()),
                    pull_username: Some(user.username),
                }),
            }
        );
    }

    #[tokio::test]
    async fn single_pull_is_not_deduplicated() {
        let harness = Harness::with_upstream("https://upstream.example/v2");
        for _ in 0..2 {
            let _ = trigger_single_pull(
                State(harness.state()),
                Extension(user()),
                Json(SinglePullRequest {
                    repository: "library/alpine:3.19".into(),
                }),
            )
            .await
            .expect("accepted");
        }
        assert_eq!(harness.events.backlog_since(0).len(), 2);
    }

    #[tokio::test]
    async fn single_pull_without_upstream_is_unavailable() {
        let harness = Harness::new();
        let err = trigger_single_pull(
            State(harness.state()),
            Extension(user()),
            Json(SinglePullRequest {
                repository: "library/alpine:3.19".into(),
            }),
        )
        .await
        .expect_err("no upstream");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn single_pull_rejects_empty_repository() {
        let harness = Harness::with_upstream("https://upstream.example/v2");
        let err = trigger_single_pull(
            State(harness.state()),
            Extension(user()),
            Json(SinglePullRequest {
                repository: "  ".into(),
            }),
        )
        .await
        .expect_err("empty repository");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn single_pull_rejects_repository_without_tag() {
        let harness = Harness::with_upstream("https://upstream.example/v2");
        let err = trigger_single_pull(
            State(harness.state()),
            Extension(user()),
            Json(SinglePullRequest {
                repository: "library/alpine".into(),
            }),
        )
        .await
        .expect_err("untagged repository");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(harness.events.backlog_since(0).is_empty());
    }
}
