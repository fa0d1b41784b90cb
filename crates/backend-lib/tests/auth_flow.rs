//! End-to-end flows through the full router.
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use volunteer_backend::{
    auth::{CredentialHasher, Pbkdf2Hasher, TokenIssuer},
    config::{JwtSettings, Settings},
    error::{AppError, GENERIC_LOGIN_FAILURE},
    router::create_router,
    storage::{MemoryUserStore, NewUser, UserStore},
    AppState,
};
use volunteer_common::Role;

const SECRET: &str = "integration-test-signing-secret";

fn settings(ttl_minutes: i64) -> Settings {
    Settings {
        jwt: JwtSettings {
            secure_key: Some(SECRET.to_string()),
            ttl_minutes,
        },
        ..Settings::default()
    }
}

async fn seeded_store() -> Arc<MemoryUserStore> {
    let store = Arc::new(MemoryUserStore::new());
    let credential = Pbkdf2Hasher::new()
        .new_credential("root", "rootpassword")
        .unwrap();
    store
        .insert(NewUser {
            credential,
            first_name: "Root".to_string(),
            last_name: "Admin".to_string(),
            email: "root@example.org".to_string(),
            is_admin: true,
        })
        .await
        .unwrap();
    store
}

async fn app_with_ttl(ttl_minutes: i64) -> (Arc<AppState>, Router) {
    let state =
        Arc::new(AppState::new(seeded_store().await, settings(ttl_minutes)).unwrap());
    (state.clone(), create_router(state))
}

async fn app() -> (Arc<AppState>, Router) {
    app_with_ttl(60).await
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with(uri: &str, header_name: header::HeaderName, value: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header_name, value)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` of the first cookie with this name
fn cookie_pair(cookies: &[String], name: &str) -> String {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{name}=")))
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string()
}

async fn register(app: &Router, username: &str, password: &str) -> Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/user/register",
            json!({
                "username": username,
                "password": password,
                "firstName": "Alice",
                "lastName": "Liddell",
                "email": format!("{username}@example.org"),
            }),
        ))
        .await
        .unwrap()
}

async fn api_login(app: &Router, username: &str, password: &str) -> Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/user/login",
            json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap()
}

async fn token_for(app: &Router, username: &str, password: &str) -> String {
    let response = api_login(app, username, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_register_then_login() {
    let (state, app) = app().await;

    let response = register(&app, "alice", "correcthorse1").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let user = body_json(response).await;
    assert_eq!(user["username"], "alice");
    assert_eq!(user["isAdmin"], false);
    assert!(user.get("pswdHash").is_none());

    let response = api_login(&app, "alice", "correcthorse1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 3600);

    let claims = state.tokens.validate(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.role(), Role::User);
    assert_eq!(claims.user_id(), Some(user["id"].as_i64().unwrap()));
}

#[tokio::test]
async fn test_failed_logins_share_one_message() {
    let (_, app) = app().await;
    register(&app, "alice", "correcthorse1").await;

    let wrong_password = api_login(&app, "alice", "wrongpass").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let wrong_password = body_json(wrong_password).await;

    let unknown_user = api_login(&app, "nobody", "wrongpass").await;
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let unknown_user = body_json(unknown_user).await;

    assert_eq!(wrong_password["error"]["message"], GENERIC_LOGIN_FAILURE);
    assert_eq!(wrong_password, unknown_user);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let (_, app) = app().await;
    assert_eq!(register(&app, "alice", "correcthorse1").await.status(), StatusCode::CREATED);

    let response = register(&app, "Alice", "correcthorse2").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_registration_is_validated() {
    let (_, app) = app().await;
    assert_eq!(register(&app, "al", "correcthorse1").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(register(&app, "alice", "short").await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anonymous_cannot_register_admin() {
    let (_, app) = app().await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/user/register",
            json!({
                "username": "mallory",
                "password": "correcthorse1",
                "firstName": "Mal",
                "lastName": "Lory",
                "email": "mallory@example.org",
                "isAdmin": true,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_me_with_bearer_token() {
    let (_, app) = app().await;
    register(&app, "alice", "correcthorse1").await;
    let token = token_for(&app, "alice", "correcthorse1").await;

    let response = app
        .clone()
        .oneshot(get_with("/api/user/me", header::AUTHORIZATION, &format!("Bearer {token}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let me = body_json(response).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["source"], "Token");
    assert_eq!(me["role"], "User");
    assert_eq!(me["isAdmin"], false);
    assert_eq!(me["userId"], 2);
}

#[tokio::test]
async fn test_me_requires_identity() {
    let (_, app) = app().await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/user/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_with("/api/user/me", header::AUTHORIZATION, "Bearer garbage"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_browser_login_sets_cookies_and_session() {
    let (state, app) = app().await;
    register(&app, "alice", "correcthorse1").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/user/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=alice&password=correcthorse1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let access = cookies
        .iter()
        .find(|c| c.starts_with("access_token="))
        .unwrap();
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("Secure"));
    assert!(access.contains("SameSite=Strict"));
    assert!(access.contains("Max-Age=3600"));

    let cookie_name = state.settings.session.cookie_name.clone();
    let session = cookie_pair(&cookies, &cookie_name);

    // The session alone identifies the caller
    let response = app
        .clone()
        .oneshot(get_with("/api/user/me", header::COOKIE, &session))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["source"], "LegacySession");

    // So does the access-token cookie
    let access = cookie_pair(&cookies, "access_token");
    let response = app
        .clone()
        .oneshot(get_with("/api/user/me", header::COOKIE, &access))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["source"], "Token");

    // Logout ends the session and clears both cookies
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/user/logout")
                .header(header::COOKIE, &session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = set_cookies(&response);
    assert!(cleared
        .iter()
        .any(|c| c.starts_with("access_token=") && c.contains("Max-Age=0")));
    assert!(cleared
        .iter()
        .any(|c| c.starts_with(&format!("{cookie_name}=")) && c.contains("Max-Age=0")));

    let response = app
        .clone()
        .oneshot(get_with("/api/user/me", header::COOKIE, &session))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_ping() {
    let (_, app) = app().await;
    register(&app, "alice", "correcthorse1").await;

    let anonymous = app
        .clone()
        .oneshot(Request::builder().uri("/api/admin/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let user_token = token_for(&app, "alice", "correcthorse1").await;
    let user = app
        .clone()
        .oneshot(get_with("/api/admin/ping", header::AUTHORIZATION, &format!("Bearer {user_token}")))
        .await
        .unwrap();
    assert_eq!(user.status(), StatusCode::FORBIDDEN);

    let admin_token = token_for(&app, "root", "rootpassword").await;
    let admin = app
        .clone()
        .oneshot(get_with("/api/admin/ping", header::AUTHORIZATION, &format!("Bearer {admin_token}")))
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::OK);
    assert_eq!(body_json(admin).await["userId"], 1);
}

#[tokio::test]
async fn test_change_password() {
    let (_, app) = app().await;
    register(&app, "alice", "correcthorse1").await;
    let token = token_for(&app, "alice", "correcthorse1").await;

    let change = |current: &str, new: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/user/change-password")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "currentPassword": current, "newPassword": new }).to_string(),
            ))
            .unwrap()
    };

    let rejected = app.clone().oneshot(change("wrongpass", "batterystaple2")).await.unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let changed = app.clone().oneshot(change("correcthorse1", "batterystaple2")).await.unwrap();
    assert_eq!(changed.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        api_login(&app, "alice", "correcthorse1").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(api_login(&app, "alice", "batterystaple2").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_zero_ttl_token_is_rejected_immediately() {
    let (state, app) = app_with_ttl(0).await;
    register(&app, "alice", "correcthorse1").await;

    let token = token_for(&app, "alice", "correcthorse1").await;
    assert!(matches!(state.tokens.validate(&token), Err(AppError::ExpiredToken)));

    let response = app
        .clone()
        .oneshot(get_with("/api/user/me", header::AUTHORIZATION, &format!("Bearer {token}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let direct = TokenIssuer::new(SECRET, 0).unwrap();
    let token = direct.issue("alice", Role::User, Some(1)).unwrap();
    assert!(matches!(direct.validate(&token), Err(AppError::ExpiredToken)));
}

#[tokio::test]
async fn test_missing_secret_is_fatal() {
    let result = AppState::new(Arc::new(MemoryUserStore::new()), Settings::default());
    assert!(matches!(result, Err(AppError::ConfigurationMissing(_))));
}

#[tokio::test]
async fn test_health() {
    let (_, app) = app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
