use axum::{extract::State, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::otp::{normalize_phone, OtpStore, SendOtpRequest, VerifyOtpRequest};

/// Issue a code for the phone. Delivery happens outside this service.
pub async fn send_otp(
    State(store): State<OtpStore>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    request.validate()?;

    let phone = normalize_phone(&request.phone)?;
    let code = store.issue(&phone).await?;
    tracing::info!(phone = %phone, "OTP issued");
    tracing::debug!(phone = %phone, code = %code, "OTP code generated");

    Ok(Json(ApiResponse::success(
        json!({ "message": "OTP sent successfully." }),
    )))
}

pub async fn verify_otp(
    State(store): State<OtpStore>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    request.validate()?;

    if let Err(e) = store.verify(&request.phone, &request.otp).await {
        tracing::warn!(error = %e, "OTP verification failed");
        return Err(e.into());
    }
    tracing::info!("OTP verified");

    Ok(Json(ApiResponse::success(
        json!({ "message": "OTP verified successfully." }),
    )))
}
