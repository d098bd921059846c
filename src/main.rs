mod config;
mod db;
mod handlers;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hello-backend")]
#[command(about = "Demo backend with hello, ping, dbcheck and metrics endpoints", long_about = None)]
struct Args {
    /// Host for HTTP server
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port for HTTP server
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    #[command(flatten)]
    db: config::DbConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    tracing::info!("Database target: {}", args.db);

    let state = Arc::new(handlers::AppState::new(args.db));
    let app = handlers::router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
