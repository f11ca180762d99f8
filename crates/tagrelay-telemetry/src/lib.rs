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

//! Telemetry primitives shared across the tagrelay workspace.
//!
//! Layout: `init.rs` (subscriber installation), `metrics.rs` (Prometheus
//! registry), `layers.rs` (request id middleware), `error.rs` (`TelemetryError`).

pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{REQUEST_ID_HEADER, propagate_request_id_layer, set_request_id_layer};
pub use metrics::{Metrics, MetricsSnapshot, PullOutcome};
