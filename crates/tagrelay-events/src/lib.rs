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

//! Core event bus for the tagrelay service.
//!
//! The bus provides a typed event enum, sequential identifiers, and support for
//! replaying recent events when subscribers reconnect. Start-replication
//! requests from the trigger endpoints travel over this bus to the replication
//! orchestrator.
//!
//! Layout: `payloads.rs` (event types), `routing.rs` (broadcast bus),
//! `error.rs` (bus errors).

pub mod error;
pub mod payloads;
pub mod routing;

pub use error::{EventBusError, EventBusResult};
pub use payloads::{
    AD_HOC_POLICY_ID, DEFAULT_LIVE_CAPACITY, DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, JobStatus,
    PullMetadata,
};
pub use routing::{EventBus, EventStream};
