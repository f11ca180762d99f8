//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers deserialised from YAML and patched from the environment.
//! - Defaults keep a bare deployment bootable; `validate.rs` rejects unusable values.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix placed in front of shared secrets in service-to-service `Authorization` headers.
pub const DEFAULT_SECRET_PREFIX: &str = "Relay-Secret ";

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// `PostgreSQL` connection string for the job ledger and policy store.
    pub database_url: Option<String>,
    /// Base URL the job service uses to reach this service (status callbacks).
    pub internal_base_url: Option<String>,
    /// Registry endpoint that receives transferred images.
    pub external_endpoint: Option<String>,
    /// Single-pull upstream and credential substitution settings.
    pub remote_pull: RemotePullConfig,
    /// Asynchronous job service settings.
    pub jobservice: JobServiceConfig,
    /// Accounts allowed to call the API and the pull proxy.
    pub accounts: Vec<Account>,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_url: None,
            internal_base_url: None,
            external_endpoint: None,
            remote_pull: RemotePullConfig::default(),
            jobservice: JobServiceConfig::default(),
            accounts: Vec::new(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Look up an account by username.
    #[must_use]
    pub fn account(&self, username: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|account| account.username == username)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the API listener to.
    pub bind_addr: IpAddr,
    /// TCP port for the API listener.
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8080,
        }
    }
}

/// Settings for the single-pull upstream fronted by the pull proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemotePullConfig {
    /// Upstream registry base URL; also the source for ad hoc transfers.
    pub upstream_url: Option<String>,
    /// Whether ad hoc transfers may reach the source without TLS verification.
    pub source_insecure: bool,
    /// Shared secret embedded in the substituted credential.
    pub secret: String,
    /// Prefix placed before the shared secret in the `Authorization` header.
    pub secret_prefix: String,
    /// Skip certificate validation when proxying to the upstream.
    pub skip_tls_verify: bool,
    /// Upper bound for a single proxied exchange, in seconds.
    pub timeout_secs: u64,
}

impl Default for RemotePullConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            source_insecure: false,
            secret: String::new(),
            secret_prefix: DEFAULT_SECRET_PREFIX.to_string(),
            skip_tls_verify: false,
            timeout_secs: 300,
        }
    }
}

impl RemotePullConfig {
    /// Timeout applied to proxied exchanges.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the asynchronous job service that performs transfers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobServiceConfig {
    /// Base URL of the job service.
    pub url: Option<String>,
    /// Shared secret used in both directions (submission and status callbacks).
    pub secret: String,
    /// Upper bound for a single submission, in seconds.
    pub timeout_secs: u64,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: String::new(),
            timeout_secs: 30,
        }
    }
}

impl JobServiceConfig {
    /// Timeout applied to job submissions.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Account permitted to authenticate against the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Login name; also the identity forwarded by the pull proxy.
    pub username: String,
    /// Argon2 PHC string of the account secret.
    pub secret_hash: String,
    /// Authorisation role.
    #[serde(default)]
    pub role: Role,
}

/// Authorisation roles recognised by the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System administrator.
    Admin,
    /// Trusted service account.
    SolutionUser,
    /// Regular authenticated user.
    #[default]
    User,
}

impl Role {
    /// Whether the role may trigger policy replication and manage policies.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::SolutionUser)
    }

    /// Render the role as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SolutionUser => "solution_user",
            Self::User => "user",
        }
    }
}

/// Logging preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}
