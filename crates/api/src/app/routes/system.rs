use axum::{Json, response::IntoResponse};
use chrono::Utc;

pub const SERVICE_NAME: &str = "Order Management System Backend";

pub async fn root() -> &'static str {
    "Order Management System Backend Running!"
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "time": Utc::now(),
    }))
}
