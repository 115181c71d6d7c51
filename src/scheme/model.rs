//! Penalty scheme models and slab rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::LedgerError;

/// Penalty scheme
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scheme {
    pub scheme_id: i64,
    pub scheme_name: String,
    pub description: Option<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Day range of overdue-ness mapped to an annual penalty rate (inclusive bounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Slab {
    pub start_day: i32,
    pub end_day: i32,
    pub interest_rate: Decimal,
}

impl Slab {
    pub fn new(start_day: i32, end_day: i32, interest_rate: Decimal) -> Self {
        Self {
            start_day,
            end_day,
            interest_rate,
        }
    }

    pub fn contains(&self, days: i64) -> bool {
        i64::from(self.start_day) <= days && days <= i64::from(self.end_day)
    }
}

/// Scheme with its slabs ordered by start day
#[derive(Debug, Clone, Serialize)]
pub struct SchemeDetail {
    #[serde(flatten)]
    pub scheme: Scheme,
    pub slabs: Vec<Slab>,
}

/// Request body for creating or replacing a scheme
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchemeRequest {
    #[validate(length(min = 1, max = 100))]
    pub scheme_name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub slabs: Vec<Slab>,
}

/// Sort slabs by start day and check they form one contiguous table
pub fn validate_slabs(slabs: &[Slab]) -> Result<Vec<Slab>, LedgerError> {
    if slabs.is_empty() {
        return Err(LedgerError::validation("A scheme needs at least one slab"));
    }

    let mut sorted = slabs.to_vec();
    sorted.sort_by_key(|slab| slab.start_day);

    for slab in &sorted {
        if slab.start_day < 1 || slab.end_day < slab.start_day {
            return Err(LedgerError::validation(format!(
                "Slab {}-{} must satisfy 1 <= start_day <= end_day",
                slab.start_day, slab.end_day
            )));
        }
        if slab.interest_rate <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "Slab {}-{} needs a positive interest rate",
                slab.start_day, slab.end_day
            )));
        }
    }

    for pair in sorted.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start_day != prev.end_day + 1 {
            return Err(LedgerError::validation(format!(
                "Slab starting at day {} must start at day {}",
                next.start_day,
                prev.end_day + 1
            )));
        }
    }

    Ok(sorted)
}

/// Slab whose day range contains `days`
pub fn slab_for(slabs: &[Slab], days: i64) -> Option<&Slab> {
    slabs.iter().find(|slab| slab.contains(days))
}
