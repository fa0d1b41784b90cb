// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Credentials are stored as two independent base64 strings: a 16-byte random
//! salt and a 32-byte PBKDF2-HMAC-SHA256 key derived with 100 000 rounds.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::token_generator::random_bytes;
use crate::error::AppError;

/// Salt size in bytes (128 bits)
pub const SALT_LEN: usize = 16;

/// Derived key size in bytes (256 bits)
pub const HASH_LEN: usize = 32;

/// PBKDF2 rounds; changing this invalidates every stored hash
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Stored credential for one user. Replaced as a whole, never patched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    /// base64 of `SALT_LEN` random bytes
    pub salt: String,
    /// base64 of the `HASH_LEN`-byte derived key
    pub hash: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Salted password hashing service.
///
/// Implementations are stateless and shared across tasks behind an `Arc`.
pub trait CredentialHasher: Send + Sync {
    /// Fresh random salt, base64 encoded
    fn generate_salt(&self) -> String;

    /// Derive the base64 hash for `password` under `salt`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `salt` is not valid base64.
    fn compute_hash(&self, password: &str, salt: &str) -> Result<String, AppError>;

    /// Recompute and compare in constant time. Malformed input fails closed.
    fn verify(&self, password: &str, salt: &str, expected_hash: &str) -> bool;

    /// Build a brand-new credential (new salt, new hash)
    fn new_credential(&self, username: &str, password: &str) -> Result<Credential, AppError> {
        let salt = self.generate_salt();
        let hash = self.compute_hash(password, &salt)?;
        Ok(Credential {
            username: username.to_string(),
            salt,
            hash,
        })
    }
}

/// PBKDF2-HMAC-SHA256 hasher with the fixed storage parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbkdf2Hasher;

impl Pbkdf2Hasher {
    pub fn new() -> Self {
        Self
    }

    fn derive(password: &[u8], salt: &[u8]) -> [u8; HASH_LEN] {
        let mut key = [0u8; HASH_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, &mut key);
        key
    }
}

impl CredentialHasher for Pbkdf2Hasher {
    fn generate_salt(&self) -> String {
        STANDARD.encode(random_bytes::<SALT_LEN>())
    }

    fn compute_hash(&self, password: &str, salt: &str) -> Result<String, AppError> {
        let salt = STANDARD
            .decode(salt)
            .map_err(|_| AppError::InvalidInput("salt is not valid base64".to_string()))?;
        let mut key = Self::derive(password.as_bytes(), &salt);
        let encoded = STANDARD.encode(key);
        key.zeroize();
        Ok(encoded)
    }

    fn verify(&self, password: &str, salt: &str, expected_hash: &str) -> bool {
        let Ok(salt) = STANDARD.decode(salt) else {
            return false;
        };
        // Derive before looking at the expected hash so a missing user costs
        // the same as a wrong password.
        let mut key = Self::derive(password.as_bytes(), &salt);
        let matches = match STANDARD.decode(expected_hash) {
            Ok(expected) => constant_time_eq(&key, &expected),
            Err(_) => false,
        };
        key.zeroize();
        matches
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Hash an owned plaintext and zeroize it afterwards
pub fn new_credential_secure(
    hasher: &dyn CredentialHasher,
    username: &str,
    mut plain: String,
) -> Result<Credential, AppError> {
    let credential = hasher.new_credential(username, &plain);
    plain.zeroize();
    credential
}

/// Password rules. Length limits always apply; the character classes are
/// opt-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            max_length: MAX_PASSWORD_LENGTH,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

/// Check if a password meets the requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    let length = password.chars().count();
    if length < requirements.min_length || length > requirements.max_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(char::is_uppercase) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(char::is_lowercase) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_is_deterministic() {
        let hasher = Pbkdf2Hasher::new();
        let salt = hasher.generate_salt();

        let first = hasher.compute_hash("correcthorse1", &salt).unwrap();
        let second = hasher.compute_hash("correcthorse1", &salt).unwrap();
        assert_eq!(first, second);
        assert_eq!(STANDARD.decode(&first).unwrap().len(), HASH_LEN);
    }

    #[test]
    fn test_salts_are_random_and_sized() {
        let hasher = Pbkdf2Hasher::new();
        let a = hasher.generate_salt();
        let b = hasher.generate_salt();

        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(&a).unwrap().len(), SALT_LEN);
    }

    #[test]
    fn test_same_password_different_salt_differs() {
        let hasher = Pbkdf2Hasher::new();
        let one = hasher.new_credential("alice", "correcthorse1").unwrap();
        let two = hasher.new_credential("bob", "correcthorse1").unwrap();
        assert_ne!(one.hash, two.hash);
    }

    #[test]
    fn test_verify_accepts_right_and_rejects_wrong_password() {
        let hasher = Pbkdf2Hasher::new();
        let salt = hasher.generate_salt();
        let hash = hasher.compute_hash("correcthorse1", &salt).unwrap();

        assert!(hasher.verify("correcthorse1", &salt, &hash));
        assert!(!hasher.verify("wrongpass", &salt, &hash));

        let other = hasher.compute_hash("correcthorse2", &salt).unwrap();
        assert!(!hasher.verify("correcthorse1", &salt, &other));
    }

    #[test]
    fn test_malformed_base64_fails_closed() {
        let hasher = Pbkdf2Hasher::new();
        let salt = hasher.generate_salt();
        let hash = hasher.compute_hash("correcthorse1", &salt).unwrap();

        assert!(!hasher.verify("correcthorse1", "not base64!!", &hash));
        assert!(!hasher.verify("correcthorse1", &salt, "%%%"));
        assert!(!hasher.verify("correcthorse1", &salt, ""));
        assert!(matches!(
            hasher.compute_hash("correcthorse1", "not base64!!"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_credential_secure_matches_verify() {
        let hasher = Pbkdf2Hasher::new();
        let credential =
            new_credential_secure(&hasher, "alice", "correcthorse1".to_string()).unwrap();

        assert_eq!(credential.username, "alice");
        assert!(hasher.verify("correcthorse1", &credential.salt, &credential.hash));
        assert!(!format!("{credential:?}").contains(&credential.hash));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
        assert!(!constant_time_eq(b"", b"x"));
    }

    #[test]
    fn test_password_strength_validation() {
        let requirements = PasswordRequirements::default();

        assert!(validate_password_strength("correcthorse1", &requirements));
        assert!(!validate_password_strength("short", &requirements));
        assert!(!validate_password_strength(&"x".repeat(257), &requirements));

        let strict = PasswordRequirements {
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            ..PasswordRequirements::default()
        };
        assert!(validate_password_strength("SecureP@ssw0rd", &strict));
        assert!(!validate_password_strength("securep@ssw0rd", &strict));
        assert!(!validate_password_strength("SECUREP@SSW0RD", &strict));
        assert!(!validate_password_strength("SecureP@ssword", &strict));
        assert!(!validate_password_strength("SecurePassw0rd", &strict));
    }
}
