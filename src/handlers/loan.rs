use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::loan::{
    CreateLoanRequest, ListLoansQuery, LoanDetail, LoanService, LoanSummary, NextPaymentDue,
    PaymentReceipt, RecordPaymentRequest,
};
use crate::models::{ApiResponse, PaginatedResponse};

pub async fn create_loan(
    State(service): State<Arc<LoanService>>,
    Json(request): Json<CreateLoanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoanDetail>>), ApiError> {
    let loan = service.originate(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(loan))))
}

pub async fn list_loans(
    State(service): State<Arc<LoanService>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<LoanSummary>>>, ApiError> {
    let result = service.list_loans(query).await?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn get_loan(
    State(service): State<Arc<LoanService>>,
    Path(loan_id): Path<i64>,
) -> Result<Json<ApiResponse<LoanDetail>>, ApiError> {
    let loan = service.get_loan(loan_id).await?;
    Ok(Json(ApiResponse::success(loan)))
}

pub async fn get_next_payment(
    State(service): State<Arc<LoanService>>,
    Path(loan_id): Path<i64>,
) -> Result<Json<ApiResponse<NextPaymentDue>>, ApiError> {
    let due = service.next_payment_due(loan_id).await?;
    Ok(Json(ApiResponse::success(due)))
}

pub async fn record_payment(
    State(service): State<Arc<LoanService>>,
    Path((loan_id, payment_id)): Path<(i64, i64)>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentReceipt>>, ApiError> {
    let receipt = service.record_payment(loan_id, payment_id, request).await?;
    Ok(Json(ApiResponse::success(receipt)))
}
