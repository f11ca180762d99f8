//! Account secret hashing and verification.

use argon2::Argon2;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    rand_core::OsRng,
};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{Account, RelayConfig};

/// Produce an Argon2 PHC string for the supplied secret.
///
/// # Errors
///
/// Returns [`ConfigError::SecretHashFailed`] if hashing fails.
pub fn hash_secret(input: &str) -> ConfigResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map_err(|detail| ConfigError::SecretHashFailed { detail })?;
    Ok(hash.to_string())
}

/// Check a candidate secret against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only malformed hashes and internal failures error.
///
/// # Errors
///
/// Returns an error if the stored hash cannot be parsed or verification fails
/// for a reason other than a mismatch.
pub fn verify_secret(expected_hash: &str, candidate: &str) -> ConfigResult<bool> {
    let parsed =
        PasswordHash::new(expected_hash).map_err(|detail| ConfigError::StoredHashInvalid { detail })?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(detail) => Err(ConfigError::SecretVerifyFailed { detail }),
    }
}

impl RelayConfig {
    /// Resolve an account from a username/secret pair.
    ///
    /// Unknown usernames and wrong secrets both yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored hash for the account is unusable.
    pub fn authenticate(&self, username: &str, secret: &str) -> ConfigResult<Option<&Account>> {
        let Some(account) = self.account(username) else {
            debug!(username, "unknown account");
            return Ok(None);
        };
        if verify_secret(&account.secret_hash, secret)? {
            Ok(Some(account))
        } else {
            debug!(username, "secret mismatch");
            Ok(None)
        }
    }
}
