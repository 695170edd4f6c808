//! Liveness endpoint

use axum::{response::IntoResponse, Json};
use serde_json::json;

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "tagql"
    }))
}
