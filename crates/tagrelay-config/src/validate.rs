//! Validation of merged configuration values.

use std::collections::HashSet;

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::RelayConfig;

/// Validate a merged configuration document.
///
/// # Errors
///
/// Returns the first [`ConfigError`] describing an unusable value.
pub fn validate(config: &RelayConfig) -> ConfigResult<()> {
    match config.internal_base_url.as_deref() {
        Some(value) => ensure_http_url("root", "internal_base_url", value)?,
        None => {
            return Err(ConfigError::MissingField {
                section: "root",
                field: "internal_base_url",
            });
        }
    }

    if let Some(value) = config.remote_pull.upstream_url.as_deref() {
        ensure_http_url("remote_pull", "upstream_url", value)?;
        if config.remote_pull.secret.is_empty() {
            return Err(ConfigError::MissingField {
                section: "remote_pull",
                field: "secret",
            });
        }
    }
    if config.remote_pull.timeout_secs == 0 {
        return Err(zero_timeout("remote_pull"));
    }

    if let Some(value) = config.jobservice.url.as_deref() {
        ensure_http_url("jobservice", "url", value)?;
    }
    if config.jobservice.timeout_secs == 0 {
        return Err(zero_timeout("jobservice"));
    }

    let mut seen = HashSet::new();
    for account in &config.accounts {
        if account.username.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                section: "accounts",
                field: "username",
                value: None,
                reason: "empty",
            });
        }
        if !seen.insert(account.username.as_str()) {
            return Err(ConfigError::InvalidField {
                section: "accounts",
                field: "username",
                value: Some(account.username.clone()),
                reason: "duplicate",
            });
        }
    }

    Ok(())
}

fn ensure_http_url(section: &'static str, field: &'static str, value: &str) -> ConfigResult<()> {
    let parsed = Url::parse(value).map_err(|_| ConfigError::InvalidField {
        section,
        field,
        value: Some(value.to_string()),
        reason: "invalid_url",
    })?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(ConfigError::InvalidField {
            section,
            field,
            value: Some(value.to_string()),
            reason: "unsupported_scheme",
        })
    }
}

const fn zero_timeout(section: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field: "timeout_secs",
        value: None,
        reason: "must_be_positive",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, Role};

    fn base() -> RelayConfig {
        RelayConfig {
            internal_base_url: Some("http://core:8080".into()),
            ..RelayConfig::default()
        }
    }

    #[test]
    fn minimal_configuration_passes() {
        assert!(validate(&base()).is_ok());
    }

    #[test]
    fn upstream_requires_secret() {
        let mut config = base();
        config.remote_pull.upstream_url = Some("https://hub.example".into());
        let err = validate(&config).expect_err("secret is required");
        assert!(matches!(
            err,
            ConfigError::MissingField {
                section: "remote_pull",
                field: "secret"
            }
        ));

        config.remote_pull.secret = "shared".into();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let mut config = base();
        config.jobservice.url = Some("ftp://jobs.example".into());
        let err = validate(&config).expect_err("scheme must be http(s)");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                reason: "unsupported_scheme",
                ..
            }
        ));
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let mut config = base();
        let account = Account {
            username: "dup".into(),
            secret_hash: "x".into(),
            role: Role::User,
        };
        config.accounts = vec![account.clone(), account];
        let err = validate(&config).expect_err("usernames must be unique");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                reason: "duplicate",
                ..
            }
        ));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = base();
        config.jobservice.timeout_secs = 0;
        assert!(validate(&config).is_err());
    }
}
