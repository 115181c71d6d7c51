//! Route definitions for the gold-loan ledger API

mod investment;
mod loan;
mod otp;
mod scheme;

use axum::{middleware, routing::get, Router};

use crate::handlers::health_check;
use crate::state::AppState;

pub use investment::investment_routes;
pub use loan::loan_routes;
pub use otp::otp_routes;
pub use scheme::scheme_routes;

/// Every API route with request tracing, bound to `state`
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(loan_routes())
        .merge(scheme_routes())
        .merge(otp_routes())
        .merge(investment_routes())
        .with_state(state)
        .layer(middleware::from_fn(crate::middleware::request_tracing))
}
