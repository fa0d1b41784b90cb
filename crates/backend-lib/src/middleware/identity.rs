use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::cookies::ACCESS_TOKEN_COOKIE;
use crate::auth::{RequestCredentials, ResolvedIdentity};
use crate::AppState;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Resolve the caller once per request and stash the result in the request
/// extensions. The bearer header takes precedence over the cookie. The legacy
/// session is only loaded, and so only renewed, when no valid token is present.
pub async fn resolve_identity(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers())
        .or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()));

    let identity = match token.as_deref().and_then(|t| state.resolver.resolve_token(t)) {
        Some(identity) => identity,
        None => {
            let session = match jar.get(&state.settings.session.cookie_name) {
                Some(cookie) => state.sessions.load(cookie.value()).await,
                None => None,
            };
            state.resolver.resolve(&RequestCredentials { token: None, session })
        }
    };
    tracing::debug!(source = ?identity.source, user_id = ?identity.user_id, "resolved identity");

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// The identity resolved for this request; anonymous outside the middleware
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub ResolvedIdentity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ResolvedIdentity>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}
