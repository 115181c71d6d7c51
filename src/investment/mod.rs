//! Investment pool: a running-balance ledger of capital added and withdrawn

pub mod model;
pub mod service;

pub use model::{InvestmentAction, InvestmentEntry, InvestmentHistory, RecordInvestmentRequest};
pub use service::InvestmentService;
