//! Loan ledger: origination, interest arithmetic and the payment recorder

pub mod interest;
pub mod model;
pub mod payment;
pub mod repository;
pub mod service;

pub use model::*;
pub use service::LoanService;
