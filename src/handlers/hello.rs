use axum::Json;
use serde_json::{json, Value};

pub const GREETING: &str = "Hello from backend!";

pub async fn hello() -> Json<Value> {
    Json(json!({ "message": GREETING }))
}
