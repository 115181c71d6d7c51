//! Interest arithmetic shared by origination, payments and the jobs.
//!
//! Rates are annual percentages. Amounts stay unrounded while they are
//! being derived and are rounded to two places only when they are about to
//! be written to the ledger.

use chrono::{DateTime, FixedOffset, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const DAYS_IN_YEAR: Decimal = dec!(365);
pub const MONTHS_IN_YEAR: Decimal = dec!(12);

/// Days of interest charged up front on the first installment
pub const INITIAL_INTEREST_DAYS: i64 = 15;

/// Loan age after which the first installment is charged pro rata
pub const PRO_RATA_LIMIT_DAYS: i64 = 30;

/// A balance at or below this is treated as fully repaid
pub const CLOSURE_TOLERANCE: Decimal = dec!(0.01);

const SECONDS_PER_DAY: i64 = 86_400;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `principal × rate / 100 / 365`, unrounded
pub fn daily_interest(principal: Decimal, annual_rate: Decimal) -> Decimal {
    principal * annual_rate / dec!(100) / DAYS_IN_YEAR
}

pub fn pro_rata_interest(principal: Decimal, annual_rate: Decimal, days: i64) -> Decimal {
    round_money(daily_interest(principal, annual_rate) * Decimal::from(days))
}

/// Interest put on the first installment at origination
pub fn initial_interest(principal: Decimal, annual_rate: Decimal) -> Decimal {
    pro_rata_interest(principal, annual_rate, INITIAL_INTEREST_DAYS)
}

/// `principal × rate / 100 / 12`, rounded
pub fn monthly_interest(principal: Decimal, annual_rate: Decimal) -> Decimal {
    round_money(principal * annual_rate / dec!(100) / MONTHS_IN_YEAR)
}

pub fn is_settled(balance: Decimal) -> bool {
    balance <= CLOSURE_TOLERANCE
}

/// Whole days elapsed, floored (negative when `to` precedes `from`)
pub fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Calendar date in the business time zone
pub fn business_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Same day next month, clamped to the month's last day
pub fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(1))
}

/// Where a loan sits in its first-installment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualStage {
    /// `loan_datetime` is in the future
    NotStarted,
    /// Days 0-15: the up-front 15-day interest stands
    Initial,
    /// Days 16-30: interest follows the elapsed days
    ProRata,
    /// Beyond day 30
    Overdue,
}

impl AccrualStage {
    pub fn for_age(days_since_start: i64) -> Self {
        match days_since_start {
            d if d < 0 => AccrualStage::NotStarted,
            d if d <= INITIAL_INTEREST_DAYS => AccrualStage::Initial,
            d if d <= PRO_RATA_LIMIT_DAYS => AccrualStage::ProRata,
            _ => AccrualStage::Overdue,
        }
    }
}
