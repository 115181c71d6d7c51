//! HTTP surface tests
//!
//! The router runs against a lazily-connected pool, so these cover the
//! requests that are answered before any database access.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::FixedOffset;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use goldledger_server::middleware::REQUEST_ID_HEADER;
use goldledger_server::otp::OtpStore;
use goldledger_server::routes;
use goldledger_server::state::AppState;

fn test_app(otp_store: OtpStore) -> Router {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/goldledger_test".to_string());
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy(&database_url)
        .expect("Failed to build lazy pool");

    let offset = FixedOffset::east_opt(330 * 60).unwrap();
    routes::app(AppState::new(pool, offset, otp_store))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

// ===== OTP =====

#[tokio::test]
async fn test_send_otp_succeeds() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/otp/send",
        Some(json!({ "phone": "+91 98765 43210", "name": "Asha" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_send_otp_rejects_short_phone() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/otp/send",
        Some(json!({ "phone": "12345", "name": "Asha" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_verify_without_issued_code_fails() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/otp/verify",
        Some(json!({ "phone": "9876543210", "otp": "123456" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn test_verify_issued_code_once() {
    let store = OtpStore::default();
    let code = store.issue("9876543210").await.unwrap();
    let app = test_app(store);

    let payload = json!({ "phone": "919876543210", "otp": code });
    let (status, _) = send(app.clone(), "POST", "/api/otp/verify", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app, "POST", "/api/otp/verify", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===== Payments =====

#[tokio::test]
async fn test_zero_payment_is_invalid_amount() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/loans/1/payments/1",
        Some(json!({ "principal_payment": "0", "interest_payment": "0" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_negative_payment_is_invalid_amount() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/loans/1/payments/1",
        Some(json!({ "principal_payment": "-10", "interest_payment": "50" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_AMOUNT");
}

// ===== Loans =====

fn loan_request(amount_issued: &str, ornaments: Value) -> Value {
    json!({
        "customer_id": 1,
        "scheme_id": null,
        "interest_rate": "12",
        "loan_datetime": "2024-01-10T04:30:00Z",
        "due_date": "2025-01-10",
        "eligible_amount": "100000",
        "amount_issued": amount_issued,
        "processing_fee": "500",
        "ornaments": ornaments
    })
}

#[tokio::test]
async fn test_loan_above_eligible_amount_is_rejected() {
    let ornaments = json!([{
        "ornament_id": null,
        "ornament_type": "Chain",
        "ornament_name": "Gold chain",
        "grams": "24.5",
        "karat": "22K"
    }]);
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/loans",
        Some(loan_request("150000", ornaments)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_loan_without_ornaments_is_rejected() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/loans",
        Some(loan_request("90000", json!([]))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

// ===== Schemes and investments =====

#[tokio::test]
async fn test_scheme_with_gap_between_slabs_is_rejected() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/schemes",
        Some(json!({
            "scheme_name": "Standard",
            "description": null,
            "slabs": [
                { "start_day": 1, "end_day": 30, "interest_rate": "12" },
                { "start_day": 40, "end_day": 60, "interest_rate": "18" }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_zero_investment_is_rejected() {
    let (status, body) = send(
        test_app(OtpStore::default()),
        "POST",
        "/api/investments",
        Some(json!({ "amount": "0", "action": "add", "remarks": null })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_AMOUNT");
}

// ===== Plumbing =====

#[tokio::test]
async fn test_request_id_is_echoed() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/otp/verify")
        .header("content-type", "application/json")
        .header(REQUEST_ID_HEADER, "req-42")
        .body(Body::from(json!({ "phone": "9876543210", "otp": "000000" }).to_string()))
        .unwrap();

    let response = test_app(OtpStore::default()).oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        "req-42"
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, _) = send(test_app(OtpStore::default()), "GET", "/api/ornaments", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
