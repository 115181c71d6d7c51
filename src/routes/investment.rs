//! Investment route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn investment_routes() -> Router<AppState> {
    Router::new().route("/api/investments", get(get_investments).post(record_investment))
}
