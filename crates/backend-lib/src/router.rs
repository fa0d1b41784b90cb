// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router.
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, user};
use crate::middleware::resolve_identity;
use crate::AppState;

/// Create the application router. Every route sees the resolved identity.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/user/register", post(user::register))
        .route("/api/user/login", post(user::api_login))
        .route("/api/user/me", get(user::me))
        .route("/api/user/change-password", post(user::change_password))
        .route("/api/admin/ping", get(handlers::admin_ping))
        .route("/user/login", post(user::web_login))
        .route("/user/logout", post(user::logout))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
