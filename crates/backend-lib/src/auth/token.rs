// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! Signed access tokens: issue at login, validate on every request.
//!
//! Tokens are compact HS256 JWTs (`header.claims.signature`, base64url). They
//! are stateless; a token is valid while its signature checks out and `exp`
//! lies in the future. Issuer and audience are not checked.
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use volunteer_common::Role;

use super::clock::{Clock, SystemClock};
use crate::config::JwtSettings;
use crate::error::AppError;

/// Canonical claim carrying the numeric user id (as a string)
pub const USER_ID_CLAIM: &str = "UserId";

/// Short name-identifier claim written by earlier token issuers
pub const NAME_IDENTIFIER_CLAIM: &str = "nameid";

/// Long-form name-identifier claim written by earlier token issuers
pub const NAME_IDENTIFIER_URI: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";

/// Long-form role claim written by earlier token issuers
pub const ROLE_URI: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Token lifetime when nothing else is configured
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// Longest lifetime the configuration accepts (one year)
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Claims carried by an access token.
///
/// `name`, `role` and `UserId` are kept as raw JSON: a claim of an unexpected
/// type is ignored by the accessors below instead of failing the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the username
    pub sub: String,
    /// Display name, equal to the username for tokens issued here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Value>,
    /// Numeric user id, written as a string
    #[serde(rename = "UserId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// Issued at (unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration (unix timestamp)
    pub exp: i64,
    /// Any other claims, kept for the legacy user-id lookups
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// `name` when present, otherwise `sub`
    pub fn username(&self) -> &str {
        self.name
            .as_ref()
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.sub)
    }

    /// Role claim (short, then long form); absent or unrecognised values
    /// count as `User`
    pub fn role(&self) -> Role {
        claim_as_string(self.role.as_ref())
            .or_else(|| self.extra_as_string(ROLE_URI))
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or(Role::User)
    }

    /// First claim that parses as an integer, in priority order:
    /// `UserId`, name identifier (short then long form), `sub`.
    pub fn user_id(&self) -> Option<i64> {
        let candidates = [
            claim_as_string(self.user_id.as_ref()),
            self.extra_as_string(NAME_IDENTIFIER_CLAIM),
            self.extra_as_string(NAME_IDENTIFIER_URI),
            Some(self.sub.clone()),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(|value| value.trim().parse::<i64>().ok())
    }

    fn extra_as_string(&self, key: &str) -> Option<String> {
        claim_as_string(self.extra.get(key))
    }
}

/// Strings and numbers read as text; anything else counts as absent
fn claim_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// HS256 token service holding the shared secret and lifetime.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer on the wall clock.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` for an empty secret, `InvalidInput` for a
    /// negative lifetime.
    pub fn new(secret: &str, ttl_minutes: i64) -> Result<Self, AppError> {
        Self::with_clock(secret, ttl_minutes, Arc::new(SystemClock))
    }

    pub fn with_clock(
        secret: &str,
        ttl_minutes: i64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        if secret.trim().is_empty() {
            return Err(AppError::ConfigurationMissing(
                "jwt.secure_key must be set to sign tokens".to_string(),
            ));
        }
        if ttl_minutes < 0 {
            return Err(AppError::InvalidInput(format!(
                "token lifetime must not be negative, got {ttl_minutes} minutes"
            )));
        }
        let ttl = Duration::try_minutes(ttl_minutes).ok_or_else(|| {
            AppError::InvalidInput(format!("token lifetime of {ttl_minutes} minutes is out of range"))
        })?;

        // Expiry is checked against the injected clock below, not by the
        // library's own wall-clock check.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            ["exp", "sub"].iter().map(|c| c.to_string()).collect::<HashSet<_>>();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            clock,
        })
    }

    pub fn from_settings(settings: &JwtSettings, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        Self::with_clock(settings.secret()?, settings.ttl_minutes, clock)
    }

    /// How long issued tokens live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a signed token for a verified user.
    pub fn issue(&self, username: &str, role: Role, user_id: Option<i64>) -> Result<String, AppError> {
        if username.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "cannot issue a token without a subject".to_string(),
            ));
        }

        let now = self.clock.now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("token expiry overflows the calendar".to_string()))?;
        let claims = Claims {
            sub: username.to_string(),
            name: Some(Value::from(username)),
            role: Some(Value::from(role.as_str())),
            user_id: user_id.map(|id| Value::from(id.to_string())),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            extra: Map::new(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("token encode: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for a bad signature, unexpected algorithm or malformed
    /// structure; `ExpiredToken` once `now >= exp`.
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        "unexpected algorithm".to_string()
                    },
                    ErrorKind::MissingRequiredClaim(claim) => format!("missing claim {claim}"),
                    _ => "malformed token".to_string(),
                };
                AppError::InvalidToken(reason)
            })?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(AppError::ExpiredToken);
        }

        Ok(data.claims)
    }
}
