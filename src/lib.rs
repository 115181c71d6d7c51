//! Gold-loan ledger service
//!
//! HTTP API and scheduled jobs over a Postgres loan ledger: loan
//! origination, payment recording, interest accrual, penalty escalation,
//! penalty schemes, phone OTPs and the investment pool.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod investment;
pub mod jobs;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod otp;
pub mod routes;
pub mod scheme;
pub mod state;
