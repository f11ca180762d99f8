//! Configuration loading: optional YAML document, then environment overrides,
//! then validation.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::RelayConfig;
use crate::validate::validate;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "TAGRELAY_CONFIG";

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_BIND_ADDR: &str = "TAGRELAY_BIND_ADDR";
const ENV_HTTP_PORT: &str = "TAGRELAY_HTTP_PORT";
const ENV_INTERNAL_URL: &str = "TAGRELAY_INTERNAL_URL";
const ENV_EXTERNAL_ENDPOINT: &str = "TAGRELAY_EXTERNAL_ENDPOINT";
const ENV_REMOTE_PULL_URL: &str = "TAGRELAY_REMOTE_PULL_URL";
const ENV_REMOTE_PULL_INSECURE: &str = "TAGRELAY_REMOTE_PULL_INSECURE";
const ENV_REMOTE_PULL_SECRET: &str = "TAGRELAY_REMOTE_PULL_SECRET";
const ENV_REMOTE_PULL_SKIP_TLS_VERIFY: &str = "TAGRELAY_REMOTE_PULL_SKIP_TLS_VERIFY";
const ENV_JOBSERVICE_URL: &str = "TAGRELAY_JOBSERVICE_URL";
const ENV_JOBSERVICE_SECRET: &str = "TAGRELAY_JOBSERVICE_SECRET";
const ENV_LOG_LEVEL: &str = "TAGRELAY_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "TAGRELAY_LOG_FORMAT";

/// Source of environment values; implemented for closures so tests can inject maps.
pub trait EnvLookup {
    /// Fetch the value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

impl RelayConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if the merged configuration fails validation.
    pub fn load() -> ConfigResult<Self> {
        Self::load_with(&|key: &str| std::env::var(key).ok())
    }

    /// Load configuration using the supplied environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if the merged configuration fails validation.
    pub fn load_with(env: &impl EnvLookup) -> ConfigResult<Self> {
        let mut config = match non_empty(env, CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                debug!("no configuration file supplied; using defaults");
                Self::default()
            }
        };
        config.apply_env(env)?;
        validate(&config)?;
        info!(
            accounts = config.accounts.len(),
            remote_pull = config.remote_pull.upstream_url.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse a YAML configuration file without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: Some(PathBuf::from(path)),
            source,
        })
    }

    /// Parse a YAML configuration document without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for the expected shape.
    pub fn from_yaml_str(document: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(document).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Apply environment overrides on top of the current values.
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be parsed into its field type.
    pub fn apply_env(&mut self, env: &impl EnvLookup) -> ConfigResult<()> {
        if let Some(value) = non_empty(env, ENV_DATABASE_URL) {
            self.database_url = Some(value);
        }
        if let Some(value) = non_empty(env, ENV_BIND_ADDR) {
            self.server.bind_addr =
                value
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidField {
                        section: "server",
                        field: "bind_addr",
                        value: Some(value.clone()),
                        reason: "invalid_ip_addr",
                    })?;
        }
        if let Some(value) = non_empty(env, ENV_HTTP_PORT) {
            self.server.http_port = value.parse().map_err(|_| ConfigError::InvalidField {
                section: "server",
                field: "http_port",
                value: Some(value.clone()),
                reason: "invalid_port",
            })?;
        }
        if let Some(value) = non_empty(env, ENV_INTERNAL_URL) {
            self.internal_base_url = Some(value);
        }
        if let Some(value) = non_empty(env, ENV_EXTERNAL_ENDPOINT) {
            self.external_endpoint = Some(value);
        }
        if let Some(value) = non_empty(env, ENV_REMOTE_PULL_URL) {
            self.remote_pull.upstream_url = Some(value);
        }
        if let Some(value) = env.get(ENV_REMOTE_PULL_INSECURE) {
            self.remote_pull.source_insecure = value == "true";
        }
        if let Some(value) = non_empty(env, ENV_REMOTE_PULL_SECRET) {
            self.remote_pull.secret = value;
        }
        if let Some(value) = env.get(ENV_REMOTE_PULL_SKIP_TLS_VERIFY) {
            self.remote_pull.skip_tls_verify = value == "true";
        }
        if let Some(value) = non_empty(env, ENV_JOBSERVICE_URL) {
            self.jobservice.url = Some(value);
        }
        if let Some(value) = non_empty(env, ENV_JOBSERVICE_SECRET) {
            self.jobservice.secret = value;
        }
        if let Some(value) = non_empty(env, ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        if let Some(value) = non_empty(env, ENV_LOG_FORMAT) {
            self.logging.format = Some(value);
        }
        Ok(())
    }
}

fn non_empty(env: &impl EnvLookup, key: &str) -> Option<String> {
    env.get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn yaml_document_populates_nested_sections() {
        let config = RelayConfig::from_yaml_str(
            r"
internal_base_url: http://core:8080
remote_pull:
  upstream_url: https://hub.example.com/v2
  secret: shh
accounts:
  - username: ops
    secret_hash: $argon2id$placeholder
    role: admin
",
        )
        .expect("yaml parses");

        assert_eq!(
            config.remote_pull.upstream_url.as_deref(),
            Some("https://hub.example.com/v2")
        );
        assert_eq!(config.accounts[0].role, Role::Admin);
        assert_eq!(config.server.http_port, 8080);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = RelayConfig::default();
        let env = env_from(&[
            (ENV_HTTP_PORT, "9090"),
            (ENV_REMOTE_PULL_URL, "https://upstream.example"),
            (ENV_REMOTE_PULL_INSECURE, "true"),
            (ENV_REMOTE_PULL_SKIP_TLS_VERIFY, "yes"),
            (ENV_JOBSERVICE_SECRET, "  js-secret "),
        ]);
        config.apply_env(&env).expect("overrides apply");

        assert_eq!(config.server.http_port, 9090);
        assert!(config.remote_pull.source_insecure);
        assert!(!config.remote_pull.skip_tls_verify);
        assert_eq!(config.jobservice.secret, "js-secret");
    }

    #[test]
    fn invalid_port_override_names_the_field() {
        let mut config = RelayConfig::default();
        let env = env_from(&[(ENV_HTTP_PORT, "eighty")]);
        let err = config.apply_env(&env).expect_err("port must be numeric");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "http_port",
                ..
            }
        ));
    }

    #[test]
    fn load_with_requires_internal_url() {
        let env = env_from(&[]);
        let err = RelayConfig::load_with(&env).expect_err("internal url is required");
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "internal_base_url",
                ..
            }
        ));
    }

    #[test]
    fn load_with_reads_file_named_by_environment() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tagrelay.yaml");
        fs::write(&path, "internal_base_url: http://core:8080\n")?;
        let path_string = path.display().to_string();
        let env = env_from(&[(CONFIG_PATH_ENV, path_string.as_str())]);

        let config = RelayConfig::load_with(&env)?;
        assert_eq!(
            config.internal_base_url.as_deref(),
            Some("http://core:8080")
        );
        Ok(())
    }
}
