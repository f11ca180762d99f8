//! Error types for hosting the HTTP server.

use std::net::SocketAddr;

use thiserror::Error;

/// Failures raised while binding or running the API listener.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listener could not bind to the requested address.
    #[error("failed to bind api listener")]
    Bind {
        /// Requested socket address.
        addr: SocketAddr,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The server loop terminated with an error.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for server results.
pub type ApiServerResult<T> = Result<T, ApiServerError>;
