//! One-time codes for customer phone verification

mod store;

pub use store::{normalize_phone, OtpStore, DEFAULT_OTP_TTL_SECONDS};

use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OtpError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid or expired OTP. Please try again.")]
    Invalid,

    #[error("OTP has expired. Please request a new one.")]
    Expired,

    #[error("Incorrect OTP entered.")]
    Mismatch,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(length(min = 10, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 10, max = 20))]
    pub phone: String,
    #[validate(length(equal = 6))]
    pub otp: String,
}
