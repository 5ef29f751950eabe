//! Health check endpoint
//!
//! Answers monitoring probes; no dependency on room or SFU state.

use axum::{response::IntoResponse, Json};
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
