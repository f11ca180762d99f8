#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Replication domain types and collaborator interfaces.
//!
//! Layout: `model/` (targets, candidates, ledger rows, policies, task
//! descriptors), `service/` (ledger, task client and policy store traits),
//! `error.rs` (`ReplicationError`).

pub mod error;
pub mod model;
pub mod service;

pub use error::{ReplicationError, ReplicationResult};
pub use model::{
    CandidateKind, FilterCandidate, IMAGE_TRANSFER_TASK, JobQuery, NewRepJob, Operation,
    PolicyDraft, PullRequest, RepJob, Replication, ReplicationPolicy, ReplicationTarget,
    TaskDescriptor, TaskKind, TaskMetadata, TransferParameters,
};
pub use service::{JobLedger, PolicyStore, TaskClient};
pub use tagrelay_events::{AD_HOC_POLICY_ID, JobStatus, PullMetadata};
