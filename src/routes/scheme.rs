//! Scheme route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn scheme_routes() -> Router<AppState> {
    Router::new()
        .route("/api/schemes", get(list_schemes).post(create_scheme))
        .route(
            "/api/schemes/:id",
            get(get_scheme).put(update_scheme).delete(delete_scheme),
        )
}
