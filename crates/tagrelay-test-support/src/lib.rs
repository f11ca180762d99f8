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

//! Shared test helpers used across the workspace.
//! Layout: fakes.rs (recording collaborators with scripted failures), postgres.rs (disposable databases).

pub mod fakes;
pub mod postgres;

pub use fakes::{MemoryPolicyStore, RecordingLedger, RecordingTaskClient};
