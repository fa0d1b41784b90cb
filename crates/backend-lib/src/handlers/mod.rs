//! HTTP handlers.
use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::middleware::CurrentIdentity;
use crate::AppState;

pub mod user;

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/admin/ping`: admin-only probe
pub async fn admin_ping(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Value>, AppError> {
    state.access.require_admin(&identity).await?;
    Ok(Json(json!({
        "status": "ok",
        "userId": state.access.current_user_id(&identity),
    })))
}
