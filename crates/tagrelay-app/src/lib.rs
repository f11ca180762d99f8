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

//! Application bootstrap: configuration, logging, persistence, replication
//! services and the HTTP surface, plus the orchestrator that turns
//! start-replication events into controller calls.

pub mod bootstrap;
pub mod error;
pub(crate) mod orchestrator;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
