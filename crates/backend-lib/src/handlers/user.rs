// ============================
// crates/backend-lib/src/handlers/user.rs
// ============================
//! Account handlers: registration, both login surfaces, logout, password change.
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Form, Json};
use axum_extra::extract::CookieJar;
use metrics::counter;
use volunteer_common::{
    ChangePasswordRequest, IdentityView, LoginRequest, RegisterRequest, Role, TokenResponse,
    UserView,
};
use zeroize::Zeroize;

use crate::auth::{new_credential_secure, SessionState};
use crate::error::AppError;
use crate::middleware::{cookies, CurrentIdentity};
use crate::storage::{NewUser, UserRecord};
use crate::validation::{validate_password, validate_registration};
use crate::AppState;

/// Well-formed salt used when the username is unknown, so the failed login
/// still pays for a full key derivation
const UNKNOWN_USER_SALT: &str = "AAAAAAAAAAAAAAAAAAAAAA==";

/// Verify a username/password pair. Every failure is `InvalidCredentials`.
async fn authenticate(state: &AppState, request: LoginRequest) -> Result<UserRecord, AppError> {
    let LoginRequest { username, mut password } = request;
    let username = username.trim();

    let user = state.users.find_by_username(username).await?;
    let (salt, expected_hash) = match &user {
        Some(user) => (user.pswd_salt.clone(), user.pswd_hash.clone()),
        None => (UNKNOWN_USER_SALT.to_string(), String::new()),
    };

    let hasher = state.hasher.clone();
    let verified = tokio::task::spawn_blocking(move || {
        let verified = hasher.verify(&password, &salt, &expected_hash);
        password.zeroize();
        verified
    })
    .await?;

    match user {
        Some(user) if verified => {
            counter!("auth.login", "outcome" => "success").increment(1);
            Ok(user)
        },
        _ => {
            counter!("auth.login", "outcome" => "failure").increment(1);
            tracing::warn!(username, "failed login attempt");
            Err(AppError::InvalidCredentials)
        },
    }
}

fn issue_for(state: &AppState, user: &UserRecord) -> Result<TokenResponse, AppError> {
    let token = state
        .tokens
        .issue(&user.username, Role::from_admin_flag(user.is_admin), Some(user.id))?;
    Ok(TokenResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl().num_seconds(),
    })
}

/// `POST /api/user/register`
///
/// New accounts are regular users; only an admin may create another admin.
pub async fn register(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    let request = validate_registration(
        request,
        &state.settings.username,
        &state.settings.password_requirements,
    )?;

    if request.is_admin && !state.access.is_admin(&identity).await {
        return Err(AppError::Forbidden);
    }

    let RegisterRequest {
        username,
        password,
        first_name,
        last_name,
        email,
        is_admin,
    } = request;

    let hasher = state.hasher.clone();
    let credential = tokio::task::spawn_blocking(move || {
        new_credential_secure(hasher.as_ref(), &username, password)
    })
    .await??;

    let user = state
        .users
        .insert(NewUser {
            credential,
            first_name,
            last_name,
            email,
            is_admin,
        })
        .await?;

    counter!("auth.registered").increment(1);
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((StatusCode::CREATED, Json(user.view())))
}

/// `POST /api/user/login`: returns a bearer token
pub async fn api_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = authenticate(&state, request).await?;
    let response = issue_for(&state, &user)?;

    tracing::info!(user_id = user.id, username = %user.username, "api login");
    Ok(Json(response))
}

/// `POST /user/login`: browser login from a form post. Sets the access-token
/// cookie and starts a fresh legacy session.
pub async fn web_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(request): Form<LoginRequest>,
) -> Result<(CookieJar, Json<UserView>), AppError> {
    let user = authenticate(&state, request).await?;
    let response = issue_for(&state, &user)?;

    let cookie_name = &state.settings.session.cookie_name;
    if let Some(previous) = jar.get(cookie_name) {
        state.sessions.clear(previous.value()).await;
    }
    let session_id = state
        .sessions
        .create(SessionState::for_user(&user.username, user.id, user.is_admin))
        .await;

    let jar = jar
        .add(cookies::access_token_cookie(&response.token, state.tokens.ttl()))
        .add(cookies::session_cookie(cookie_name, &session_id));

    tracing::info!(user_id = user.id, username = %user.username, "browser login");
    Ok((jar, Json(user.view())))
}

/// `POST /user/logout`
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let cookie_name = &state.settings.session.cookie_name;
    if let Some(session) = jar.get(cookie_name) {
        state.sessions.clear(session.value()).await;
    }

    let jar = jar
        .add(cookies::clear_access_token_cookie())
        .add(cookies::clear_session_cookie(cookie_name));
    (jar, StatusCode::NO_CONTENT)
}

/// `GET /api/user/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<IdentityView>, AppError> {
    if !identity.is_authenticated() {
        return Err(AppError::Unauthorized);
    }
    let is_admin = state.access.is_admin(&identity).await;
    Ok(Json(identity.view(is_admin)))
}

/// `POST /api/user/change-password`: replaces salt and hash together
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let username = identity.username.clone().ok_or(AppError::Unauthorized)?;
    let ChangePasswordRequest {
        current_password,
        new_password,
    } = request;

    validate_password(&new_password, &state.settings.password_requirements)?;

    let user = authenticate(
        &state,
        LoginRequest {
            username,
            password: current_password,
        },
    )
    .await?;

    let hasher = state.hasher.clone();
    let credential_username = user.username.clone();
    let credential = tokio::task::spawn_blocking(move || {
        new_credential_secure(hasher.as_ref(), &credential_username, new_password)
    })
    .await??;
    state.users.update_credential(credential).await?;

    tracing::info!(user_id = user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
