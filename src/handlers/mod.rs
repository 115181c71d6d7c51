//! API handlers for the gold-loan ledger

pub mod health;
pub mod investment;
pub mod loan;
pub mod otp;
pub mod scheme;

pub use health::*;
pub use investment::*;
pub use loan::*;
pub use otp::*;
pub use scheme::*;
