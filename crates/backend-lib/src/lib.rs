// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Identity core and HTTP surface for the volunteering platform backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::{
    AccessGate, Clock, CredentialHasher, IdentityResolver, Pbkdf2Hasher, SessionManager,
    SystemClock, TokenIssuer,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::storage::{FlatFileUserStore, UserStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Password hashing service
    pub hasher: Arc<dyn CredentialHasher>,
    /// Token issuance and validation
    pub tokens: Arc<TokenIssuer>,
    pub resolver: Arc<IdentityResolver>,
    pub access: Arc<AccessGate>,
    /// Legacy browser sessions
    pub sessions: Arc<SessionManager>,
    /// User storage backend
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Create a new application state on the wall clock.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when no signing secret is configured.
    pub fn new(users: Arc<dyn UserStore>, settings: Settings) -> Result<Self, AppError> {
        Self::with_clock(users, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        users: Arc<dyn UserStore>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let tokens = Arc::new(TokenIssuer::from_settings(&settings.jwt, clock)?);
        let resolver = Arc::new(IdentityResolver::new(tokens.clone()));
        let access = Arc::new(AccessGate::new(users.clone()));
        let sessions = Arc::new(SessionManager::new(settings.session.idle_timeout()));

        Ok(Self {
            settings: Arc::new(settings),
            hasher: Arc::new(Pbkdf2Hasher::new()),
            tokens,
            resolver,
            access,
            sessions,
            users,
        })
    }

    /// Create a new application state from `config.toml`, the environment and
    /// a flat-file user store under the configured data directory
    pub fn new_default() -> anyhow::Result<Self> {
        let settings = Settings::load()?;
        let users = Arc::new(FlatFileUserStore::new(&settings.data_dir)?);
        Ok(Self::new(users, settings)?)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
