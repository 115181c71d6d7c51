use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::scheme::{Scheme, SchemeDetail, SchemeRequest, SchemeService};

pub async fn create_scheme(
    State(service): State<Arc<SchemeService>>,
    Json(request): Json<SchemeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SchemeDetail>>), ApiError> {
    let scheme = service.create_scheme(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(scheme))))
}

pub async fn list_schemes(
    State(service): State<Arc<SchemeService>>,
) -> Result<Json<ApiResponse<Vec<Scheme>>>, ApiError> {
    let schemes = service.list_schemes().await?;
    Ok(Json(ApiResponse::success(schemes)))
}

pub async fn get_scheme(
    State(service): State<Arc<SchemeService>>,
    Path(scheme_id): Path<i64>,
) -> Result<Json<ApiResponse<SchemeDetail>>, ApiError> {
    let scheme = service.get_scheme(scheme_id).await?;
    Ok(Json(ApiResponse::success(scheme)))
}

pub async fn update_scheme(
    State(service): State<Arc<SchemeService>>,
    Path(scheme_id): Path<i64>,
    Json(request): Json<SchemeRequest>,
) -> Result<Json<ApiResponse<SchemeDetail>>, ApiError> {
    let scheme = service.update_scheme(scheme_id, request).await?;
    Ok(Json(ApiResponse::success(scheme)))
}

pub async fn delete_scheme(
    State(service): State<Arc<SchemeService>>,
    Path(scheme_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service.delete_scheme(scheme_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
