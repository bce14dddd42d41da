//! Password hashing and verification using Argon2id
//!
//! Hashes are stored as PHC strings, which embed the algorithm, parameters,
//! and salt, so verification needs nothing but the stored string.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Iterations (default: 3)
    pub time_cost: u32,
    /// Lanes (default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Smallest parameters Argon2 accepts; for tests only
    pub fn minimal() -> Self {
        Self {
            memory_cost: Params::MIN_M_COST,
            time_cost: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password with the default parameters
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

/// Hash a password with custom parameters
///
/// Returns a PHC string such as `$argon2id$v=19$m=65536,t=3,p=4$...`.
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash
///
/// `Ok(false)` means the password does not match; `Err` means the stored
/// hash could not be used at all.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password_with_config("pw", &PasswordConfig::minimal()).unwrap();

        assert!(verify_password("pw", &hash).unwrap());
        assert!(!verify_password("PW", &hash).unwrap());
        assert!(!hash.contains("pw$"));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let config = PasswordConfig::minimal();
        let hash1 = hash_password_with_config("SamePassword123!", &config).unwrap();
        let hash2 = hash_password_with_config("SamePassword123!", &config).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("SamePassword123!", &hash1).unwrap());
        assert!(verify_password("SamePassword123!", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "invalid-hash-format");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_default_hash_uses_argon2id() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=65536"));
    }

    #[test]
    fn test_custom_config() {
        let config = PasswordConfig {
            memory_cost: 32768,
            time_cost: 2,
            parallelism: 2,
            output_len: Some(32),
        };

        let hash = hash_password_with_config("TestPassword123!", &config).unwrap();
        assert!(verify_password("TestPassword123!", &hash).unwrap());
        assert!(hash.contains("m=32768"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=2"));
    }
}
