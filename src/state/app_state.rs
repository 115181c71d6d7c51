//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::FixedOffset;
use sqlx::PgPool;

use crate::investment::InvestmentService;
use crate::loan::LoanService;
use crate::otp::OtpStore;
use crate::scheme::SchemeService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub loan_service: Arc<LoanService>,
    pub scheme_service: Arc<SchemeService>,
    pub investment_service: Arc<InvestmentService>,
    pub otp_store: OtpStore,
}

impl AppState {
    pub fn new(db_pool: PgPool, business_offset: FixedOffset, otp_store: OtpStore) -> Self {
        Self {
            loan_service: Arc::new(LoanService::new(db_pool.clone(), business_offset)),
            scheme_service: Arc::new(SchemeService::new(db_pool.clone())),
            investment_service: Arc::new(InvestmentService::new(db_pool.clone())),
            otp_store,
            db_pool,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for Arc<SchemeService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.scheme_service.clone()
    }
}

impl FromRef<AppState> for Arc<InvestmentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.investment_service.clone()
    }
}

impl FromRef<AppState> for OtpStore {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.otp_store.clone()
    }
}
