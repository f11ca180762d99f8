//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use argon2::password_hash::Error as PasswordHashError;
use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A required field was not provided by the file or the environment.
    #[error("missing configuration field")]
    MissingField {
        /// Section containing the field.
        section: &'static str,
        /// Name of the missing field.
        field: &'static str,
    },
    /// Reading the configuration file failed.
    #[error("failed to read configuration file")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The configuration file was not valid YAML for the expected shape.
    #[error("failed to parse configuration file")]
    Parse {
        /// Path of the offending document, when loaded from disk.
        path: Option<PathBuf>,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// Failed to hash secret material.
    #[error("failed to hash secret material")]
    SecretHashFailed {
        /// Hashing error detail.
        detail: PasswordHashError,
    },
    /// Stored secret hash payload was invalid.
    #[error("invalid stored hash")]
    StoredHashInvalid {
        /// Hash parsing error detail.
        detail: PasswordHashError,
    },
    /// Secret verification failed for a reason other than a mismatch.
    #[error("failed to verify secret")]
    SecretVerifyFailed {
        /// Verification error detail.
        detail: PasswordHashError,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_stay_constant_while_carrying_context() {
        let err = ConfigError::InvalidField {
            section: "remote_pull",
            field: "upstream_url",
            value: Some("::nope".into()),
            reason: "invalid_url",
        };
        assert_eq!(err.to_string(), "invalid configuration field");

        let missing = ConfigError::MissingField {
            section: "server",
            field: "internal_base_url",
        };
        assert_eq!(missing.to_string(), "missing configuration field");
    }
}
