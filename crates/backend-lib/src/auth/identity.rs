// ============================
// crates/backend-lib/src/auth/identity.rs
// ============================
//! Who is calling: one resolved identity per request.
//!
//! A valid token always wins. Only when no token validates is the legacy
//! session consulted, and the two sources are never blended.
use std::sync::Arc;

use volunteer_common::{IdentitySource, IdentityView, Role};

use super::session::{SessionState, SESSION_IS_ADMIN, SESSION_USERNAME, SESSION_USER_ID};
use super::token::{Claims, TokenIssuer};

/// Caller identity for the lifetime of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub source: IdentitySource,
}

impl Default for ResolvedIdentity {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl ResolvedIdentity {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            username: None,
            role: None,
            source: IdentitySource::None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.source != IdentitySource::None
    }

    fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id(),
            username: Some(claims.username().to_string()),
            role: Some(claims.role()),
            source: IdentitySource::Token,
        }
    }

    /// `None` unless the session names a user
    fn from_session(session: &SessionState) -> Option<Self> {
        let username = session
            .get(SESSION_USERNAME)
            .map(str::trim)
            .filter(|name| !name.is_empty())?;

        let user_id = session
            .get(SESSION_USER_ID)
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        let role = session.get(SESSION_IS_ADMIN).and_then(|raw| {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case("true") {
                Some(Role::Admin)
            } else if raw.eq_ignore_ascii_case("false") {
                Some(Role::User)
            } else {
                None
            }
        });

        Some(Self {
            user_id,
            username: Some(username.to_string()),
            role,
            source: IdentitySource::LegacySession,
        })
    }

    pub fn view(&self, is_admin: bool) -> IdentityView {
        IdentityView {
            user_id: self.user_id,
            username: self.username.clone(),
            role: self.role,
            source: self.source,
            is_admin,
        }
    }
}

/// What a request presented
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    /// Raw token from the bearer header or the `access_token` cookie
    pub token: Option<String>,
    /// Snapshot of the legacy session, if the request had a live one
    pub session: Option<SessionState>,
}

/// Turns request credentials into exactly one identity
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    tokens: Arc<TokenIssuer>,
}

impl IdentityResolver {
    pub fn new(tokens: Arc<TokenIssuer>) -> Self {
        Self { tokens }
    }

    /// Token, then legacy session, then anonymous. Never fails.
    pub fn resolve(&self, credentials: &RequestCredentials) -> ResolvedIdentity {
        if let Some(identity) = credentials.token.as_deref().and_then(|t| self.resolve_token(t)) {
            return identity;
        }

        credentials
            .session
            .as_ref()
            .and_then(ResolvedIdentity::from_session)
            .unwrap_or_else(ResolvedIdentity::anonymous)
    }

    /// Identity carried by a token alone; `None` when it is empty or rejected
    pub fn resolve_token(&self, token: &str) -> Option<ResolvedIdentity> {
        if token.is_empty() {
            return None;
        }
        match self.tokens.validate(token) {
            Ok(claims) => Some(ResolvedIdentity::from_claims(&claims)),
            Err(err) => {
                tracing::debug!(error = %err, "token rejected, trying legacy session");
                None
            }
        }
    }
}
