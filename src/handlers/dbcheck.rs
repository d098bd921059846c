use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::handlers::AppState;

pub const DBCHECK_MESSAGE: &str = "hello from dbcheck";

#[derive(Serialize)]
struct DbCheckResponse<'a> {
    status: &'static str,
    inserted_id: i32,
    rows_in_hello: i64,
    db: &'a str,
    user: &'a str,
    host: &'a str,
    port: u16,
}

/// Inserts one demo row and reports the row count along with the connection target.
pub async fn dbcheck(State(state): State<Arc<AppState>>) -> Response {
    match state.store.record_hello(DBCHECK_MESSAGE).await {
        Ok(record) => {
            state.metrics.record_dbcheck(true);
            let config = &state.db_config;
            let payload = DbCheckResponse {
                status: "ok",
                inserted_id: record.inserted_id,
                rows_in_hello: record.rows_in_hello,
                db: &config.name,
                user: &config.user,
                host: &config.host,
                port: config.port,
            };
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            state.metrics.record_dbcheck(false);
            tracing::error!("dbcheck failed: {:#}", err);
            let payload = serde_json::json!({
                "status": "error",
                "error": format!("{:#}", err)
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
