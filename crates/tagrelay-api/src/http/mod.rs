//! HTTP surface modules (router, middleware, handlers).

/// Authentication middleware and helpers.
pub mod auth;
/// Shared constants and header names for HTTP surfaces.
pub mod constants;
/// Problem response helpers and error types.
pub mod errors;
/// Health and diagnostics endpoints.
pub mod health;
/// Replication job listing.
pub mod jobs;
/// Job-service status callbacks.
pub mod notifications;
/// Replication policy management.
pub mod policies;
/// Replication trigger endpoints.
pub mod replication;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
