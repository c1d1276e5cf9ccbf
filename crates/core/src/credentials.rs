//! Argon2id password hashing in PHC string format.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| CredentialError::Hash(error.to_string()))
}

/// `Ok(false)` for a wrong password; `Err` only when `stored` is not a PHC string.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CredentialError> {
    let parsed =
        PasswordHash::new(stored)
            .map_err(|error| CredentialError::MalformedHash(error.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password, CredentialError};

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter2").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).expect("verify"));
        assert!(!verify_password("hunter3", &hash).expect("verify"));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same").expect("hash");
        let second = hash_password("same").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        let error = verify_password("x", "plain-text").expect_err("not a PHC string");
        assert!(matches!(error, CredentialError::MalformedHash(_)));
    }
}
