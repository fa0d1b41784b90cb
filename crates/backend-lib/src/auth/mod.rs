// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod access;
pub mod clock;
pub mod identity;
pub mod password;
pub mod session;
pub mod token;
pub mod token_generator;

pub use access::AccessGate;
pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::{IdentityResolver, RequestCredentials, ResolvedIdentity};
pub use password::{
    new_credential_secure, validate_password_strength, Credential, CredentialHasher,
    PasswordRequirements, Pbkdf2Hasher, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
pub use session::{SessionManager, SessionState, SESSION_IDLE_TIMEOUT};
pub use token::{Claims, TokenIssuer, DEFAULT_TOKEN_TTL_MINUTES, MAX_TOKEN_TTL_MINUTES};
