//! Cookies carrying the access token and the legacy session id.
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie holding the access token for browser clients
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Access-token cookie living exactly as long as the token
pub fn access_token_cookie(token: &str, ttl: chrono::Duration) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Removal cookie for the access token
pub fn clear_access_token_cookie() -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// Browser-lifetime session cookie; idle expiry is enforced server side
pub fn session_cookie(name: &str, session_id: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Removal cookie for the session
pub fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}
