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

//! Replication orchestration: the replicator engine, the controller that
//! validates requests, the trigger entry points and the job-service client.
//!
//! Layout: `engine.rs` (`PullReplicator`, `Replicator`), `controller.rs`
//! (`PullController`), `trigger.rs` (`TriggerService`), `jobservice.rs`
//! (`HttpTaskClient`), `error.rs` (`TriggerError`).

pub mod controller;
pub mod engine;
pub mod error;
pub mod jobservice;
pub mod trigger;

pub use controller::PullController;
pub use engine::{EngineSettings, PullReplicator, Replicator, status_hook_url};
pub use error::{TriggerError, TriggerResult};
pub use jobservice::{HttpTaskClient, JOBS_PATH};
pub use trigger::{SinglePullSource, TriggerService};
