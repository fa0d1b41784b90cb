// crates/backend-lib/src/middleware/mod.rs

//! Request middleware: identity resolution and auth cookies.

pub mod cookies;
pub mod identity;

pub use identity::{bearer_token, resolve_identity, CurrentIdentity};
