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

//! HTTP surface for tagrelay: replication triggers, policy management, job
//! status callbacks, health and metrics, and the secure pull proxy.
//!
//! Layout: `http/` (router, middleware, handlers), `proxy/` (pull proxy
//! pipeline and transport), `models.rs` (request/response DTOs), `state.rs`
//! (shared handler state), `error.rs` (`ApiServerError`).

pub mod error;
pub mod http;
pub mod models;
pub mod proxy;
pub(crate) mod state;

#[cfg(test)]
pub(crate) mod test_harness;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use proxy::PullProxy;
pub use state::ApiDependencies;
