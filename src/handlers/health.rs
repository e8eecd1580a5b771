use axum::{Json, extract::State, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

use crate::state::AppState;

// health handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        "version": state.app_version,
    }))
}

// service banner
pub async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": state.app_name,
        "version": state.app_version,
        "docs": "/docs",
    }))
}
