//! In-memory OTP cache keyed by normalized phone number

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::RwLock;

use super::OtpError;

pub const DEFAULT_OTP_TTL_SECONDS: u64 = 300;

const COUNTRY_PREFIX: &str = "91";
const SUBSCRIBER_DIGITS: usize = 10;

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

/// `91` followed by the last ten digits of `phone`
pub fn normalize_phone(phone: &str) -> Result<String, OtpError> {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < SUBSCRIBER_DIGITS {
        return Err(OtpError::InvalidPhone(phone.to_string()));
    }
    let subscriber: String = digits[digits.len() - SUBSCRIBER_DIGITS..].iter().collect();
    Ok(format!("{}{}", COUNTRY_PREFIX, subscriber))
}

/// Time-bounded code store shared through application state
#[derive(Clone)]
pub struct OtpStore {
    entries: Arc<RwLock<HashMap<String, OtpEntry>>>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Generate a six-digit code for `phone`, replacing any earlier one
    pub async fn issue(&self, phone: &str) -> Result<String, OtpError> {
        self.issue_at(phone, Utc::now()).await
    }

    pub async fn issue_at(&self, phone: &str, now: DateTime<Utc>) -> Result<String, OtpError> {
        let key = normalize_phone(phone)?;
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();

        self.entries.write().await.insert(
            key,
            OtpEntry {
                code: code.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(code)
    }

    pub async fn verify(&self, phone: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(phone, code, Utc::now()).await
    }

    /// A matching or expired code is consumed; a wrong guess leaves it in place
    pub async fn verify_at(
        &self,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let key = normalize_phone(phone)?;
        let mut entries = self.entries.write().await;

        let entry = entries.get(&key).ok_or(OtpError::Invalid)?;
        if now > entry.expires_at {
            entries.remove(&key);
            return Err(OtpError::Expired);
        }
        if entry.code != code {
            return Err(OtpError::Mismatch);
        }
        entries.remove(&key);
        Ok(())
    }

    /// Drop expired entries; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        before - entries.len()
    }
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new(DEFAULT_OTP_TTL_SECONDS)
    }
}
