// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
//! Random material for credentials and legacy sessions.
//!
//! Salts and session identifiers both come from here, drawn from the
//! thread-local CSPRNG (ChaCha, reseeded from the OS).
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Session identifier size in bytes (32 bytes = 256 bits of entropy)
const SESSION_ID_BYTES: usize = 32;

/// Fill a fixed-size buffer with cryptographically secure random bytes
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buffer = [0u8; N];
    rand::rng().fill_bytes(&mut buffer);
    buffer
}

/** Generate an opaque legacy session identifier
# Returns
A base64 URL-safe encoded string without padding, safe for cookies */
pub fn generate_session_id() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<SESSION_ID_BYTES>())
}
