//! Credential hashing and secret generation.
//!
//! Passwords are hashed with Argon2id using a fresh random salt per call and
//! stored as PHC strings (`$argon2id$v=19$...`), so the parameters and salt
//! travel with the hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use thiserror::Error;

/// Length in bytes of generated signing secrets
const SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
#[error("failed to hash password: {0}")]
pub struct HashError(argon2::password_hash::Error);

/// Hash a password using Argon2.
///
/// Fails only if the hasher itself fails; any plaintext is accepted.
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(HashError)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// A malformed hash verifies as `false` rather than erroring.
pub fn verify_password(hash: &str, password: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random hex-encoded secret suitable for HMAC signing.
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; SECRET_LENGTH] = rng.random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "hunter22"));
        assert!(!verify_password(&hash, "hunter22x"));
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let hash = hash_password("plaintext-password").unwrap();
        assert!(!hash.contains("plaintext-password"));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second, "Each hash should use a fresh salt");
        assert!(verify_password(&first, "same-password"));
        assert!(verify_password(&second, "same-password"));
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!verify_password("", "anything"));
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_LENGTH * 2);
        assert_ne!(secret, generate_secret());
    }
}
