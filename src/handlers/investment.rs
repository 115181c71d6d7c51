use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::investment::{
    InvestmentEntry, InvestmentHistory, InvestmentService, RecordInvestmentRequest,
};
use crate::models::ApiResponse;

pub async fn get_investments(
    State(service): State<Arc<InvestmentService>>,
) -> Result<Json<ApiResponse<InvestmentHistory>>, ApiError> {
    let history = service.history().await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn record_investment(
    State(service): State<Arc<InvestmentService>>,
    Json(request): Json<RecordInvestmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvestmentEntry>>), ApiError> {
    let entry = service.record(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}
