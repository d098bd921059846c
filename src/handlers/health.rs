use axum::Json;
use axum::http::StatusCode;
use serde_json::{json, Value};

/// Liveness/readiness probe
pub async fn ping() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
