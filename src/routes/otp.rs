//! OTP route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn otp_routes() -> Router<AppState> {
    Router::new()
        .route("/api/otp/send", post(send_otp))
        .route("/api/otp/verify", post(verify_otp))
}
