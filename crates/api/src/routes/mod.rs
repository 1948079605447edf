use axum::{response::IntoResponse, Json};
use serde_json::json;

pub mod admin;
pub mod auth;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
