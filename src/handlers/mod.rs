pub mod dbcheck;
pub mod health;
pub mod hello;
pub mod metrics;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::DbConfig;
use crate::db::{HelloStore, PgHelloStore};
use crate::metrics::RequestMetrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HelloStore>,
    pub db_config: DbConfig,
    pub metrics: Arc<RequestMetrics>,
}

impl AppState {
    pub fn new(db_config: DbConfig) -> Self {
        Self {
            store: Arc::new(PgHelloStore::new(&db_config)),
            db_config,
            metrics: Arc::new(RequestMetrics::new()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/hello", get(hello::hello))
        .route("/ping", get(health::ping))
        .route("/api/dbcheck", get(dbcheck::dbcheck))
        .route("/dbcheck", get(dbcheck::dbcheck))
        .route("/app-metrics", get(metrics::app_metrics))
        .route("/metrics", get(metrics::app_metrics))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Counts every request by path and method before it is routed, unknown paths
/// and CORS preflights included, then records its latency and status.
async fn count_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    state.metrics.record_request(method.as_str(), &path);

    let start = Instant::now();
    let response = next.run(request).await;
    state.metrics.record_response(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );
    response
}
