use axum::{extract::State, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_loans: Option<i64>,
    pub version: &'static str,
}

pub async fn health_check(State(pool): State<PgPool>) -> Json<HealthResponse> {
    let (status, database, pending_loans) = match db::check_health(&pool).await {
        Ok(pending) => ("healthy", "connected".to_string(), Some(pending)),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            ("unhealthy", e.to_string(), None)
        }
    };

    Json(HealthResponse {
        status,
        database,
        pending_loans,
        version: env!("CARGO_PKG_VERSION"),
    })
}
