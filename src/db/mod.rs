//! Ledger database pool, schema migrations and liveness check

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use std::time::Duration;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to ledger database: {0}")]
    Connect(String),

    #[error("Failed to migrate ledger schema: {0}")]
    Migrate(String),

    #[error("Ledger database is unreachable: {0}")]
    Unhealthy(String),
}

/// Open the ledger pool. Sessions run in UTC; business dates are derived
/// in Rust from the configured offset.
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(url = %config.database_url_masked(), "Connecting to ledger database");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET TIME ZONE 'UTC'").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::Connect(e.to_string()))?;

    tracing::info!(max_connections = config.db_max_connections, "Ledger pool ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::Migrate(e.to_string()))?;

    tracing::info!("Ledger schema up to date");
    Ok(())
}

/// Number of open loans; doubles as a schema-aware connectivity check.
pub async fn check_health(pool: &PgPool) -> Result<i64, DbError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM loans WHERE completion_status = 'Pending'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::Unhealthy(e.to_string()))
}
