pub mod models;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use crate::config::DbConfig;
use crate::db::models::HelloRecord;

const CREATE_HELLO_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS hello (id SERIAL PRIMARY KEY, msg TEXT NOT NULL)";

// Serializes concurrent CREATE TABLE IF NOT EXISTS, which can otherwise race on pg_type.
const HELLO_LOCK_KEY: i64 = 0x6865_6c6c_6f;

/// Source of the demo `hello` rows used by the dbcheck endpoints.
#[async_trait]
pub trait HelloStore: Send + Sync {
    /// Ensures the table exists, inserts `msg` and returns the new id with the total row count.
    async fn record_hello(&self, msg: &str) -> Result<HelloRecord>;
}

/// Opens a fresh Postgres connection per call and closes it before returning.
pub struct PgHelloStore {
    options: PgConnectOptions,
}

impl PgHelloStore {
    pub fn new(config: &DbConfig) -> Self {
        Self {
            options: config.connect_options(),
        }
    }

    async fn insert_and_count(conn: &mut PgConnection, msg: &str) -> Result<HelloRecord> {
        let mut tx = conn.begin().await.context("Failed to begin transaction")?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(HELLO_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .context("Failed to lock hello table")?;

        sqlx::query(CREATE_HELLO_TABLE)
            .execute(&mut *tx)
            .await
            .context("Failed to create hello table")?;

        let inserted_id: i32 = sqlx::query_scalar("INSERT INTO hello (msg) VALUES ($1) RETURNING id")
            .bind(msg)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert hello row")?;

        tx.commit().await.context("Failed to commit hello row")?;

        let rows_in_hello: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hello")
            .fetch_one(&mut *conn)
            .await
            .context("Failed to count hello rows")?;

        Ok(HelloRecord {
            inserted_id,
            rows_in_hello,
        })
    }
}

#[async_trait]
impl HelloStore for PgHelloStore {
    async fn record_hello(&self, msg: &str) -> Result<HelloRecord> {
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .context("Failed to connect to database")?;

        let result = Self::insert_and_count(&mut conn, msg).await;

        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close database connection: {}", e);
        }

        result
    }
}
