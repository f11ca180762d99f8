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

//! Static configuration for the tagrelay service.
//!
//! Layout: `model.rs` (typed configuration), `loader.rs` (YAML file and
//! environment overrides), `validate.rs` (field validation), `secret.rs`
//! (account secret hashing/verification), `error.rs` (`ConfigError`).

pub mod error;
pub mod loader;
pub mod model;
pub mod secret;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, EnvLookup};
pub use model::{
    Account, DEFAULT_SECRET_PREFIX, JobServiceConfig, LoggingSettings, RelayConfig,
    RemotePullConfig, Role, ServerConfig,
};
pub use secret::{hash_secret, verify_secret};
