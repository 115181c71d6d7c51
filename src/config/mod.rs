//! Ledger server configuration, read from the process environment (and a
//! `.env` file when present).

use chrono::FixedOffset;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Asia/Kolkata, which observes no daylight saving
const DEFAULT_BUSINESS_UTC_OFFSET_MINUTES: i32 = 330;
pub const DEFAULT_ACCRUAL_CRON: &str = "0 */10 * * * *";
pub const DEFAULT_PENALTY_CRON: &str = "0 */15 * * * *";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0}")]
    Unsupported(String),
}

/// Deployment stage; production refuses permissive CORS
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                name: "ENVIRONMENT",
                value: s.to_string(),
            }),
        }
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub environment: Environment,
    pub port: u16,
    pub db_max_connections: u32,
    /// Apply pending migrations at startup
    pub run_migrations: bool,
    /// Comma separated; unset means permissive (not allowed in production)
    pub cors_allowed_origins: Option<String>,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Offset used for business dates
    pub business_offset: FixedOffset,
    /// Six-field cron expression for the accrual job, in UTC
    pub accrual_cron: String,
    /// Six-field cron expression for the penalty job, in UTC
    pub penalty_cron: String,
    pub otp_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let offset_minutes =
            parse_or("BUSINESS_UTC_OFFSET_MINUTES", DEFAULT_BUSINESS_UTC_OFFSET_MINUTES)?;

        let config = Config {
            database_url,
            environment: parse_or("ENVIRONMENT", Environment::Development)?,
            port: parse_or("PORT", 4000)?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5)?,
            run_migrations: env::var("RUN_MIGRATIONS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            business_offset: business_offset_from_minutes(offset_minutes)?,
            accrual_cron: env::var("ACCRUAL_CRON")
                .unwrap_or_else(|_| DEFAULT_ACCRUAL_CRON.to_string()),
            penalty_cron: env::var("PENALTY_CRON")
                .unwrap_or_else(|_| DEFAULT_PENALTY_CRON.to_string()),
            otp_ttl_seconds: parse_or("OTP_TTL_SECONDS", crate::otp::DEFAULT_OTP_TTL_SECONDS)?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.environment.is_production() && self.cors_allowed_origins.is_none() {
            return Err(ConfigError::Unsupported(
                "CORS_ALLOWED_ORIGINS must be set in production".to_string(),
            ));
        }
        if self.otp_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                name: "OTP_TTL_SECONDS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Database URL with the password replaced, for logs
    pub fn database_url_masked(&self) -> String {
        let Some(at) = self.database_url.find('@') else {
            return self.database_url.clone();
        };
        match self.database_url[..at].rfind(':') {
            Some(colon) if self.database_url[colon..].starts_with("://") => {
                self.database_url.clone()
            }
            Some(colon) => format!(
                "{}****{}",
                &self.database_url[..=colon],
                &self.database_url[at..]
            ),
            None => self.database_url.clone(),
        }
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

/// Offsets beyond +/-18h are rejected
pub fn business_offset_from_minutes(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::InvalidValue {
            name: "BUSINESS_UTC_OFFSET_MINUTES",
            value: minutes.to_string(),
        })
}
