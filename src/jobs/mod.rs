//! Periodic ledger jobs: interest accrual, penalty escalation and OTP purge
//!
//! Each job walks its loans one at a time. A loan is processed in its own
//! transaction holding the loan's row lock; a failure rolls back that loan
//! only and the run carries on with the next one.

pub mod accrual;
pub mod penalty;
pub mod scheduler;

use std::fmt;

use serde::Serialize;

pub use accrual::AccrualJob;
pub use penalty::PenaltyJob;
pub use scheduler::LedgerScheduler;

/// Why a loan was left untouched by a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// `loan_datetime` lies in the future
    NotStarted,
    /// The loan no longer exists or has been completed
    LoanClosed,
    /// No active Pending installment behind the loan's pointer
    NoCurrentInstallment,
    /// The current installment's month has not passed yet
    NotYetDue,
    /// No active Pending installment is past its month
    NoDefault,
    /// The loan carries no penalty scheme
    NoScheme,
    NoPenaltySlab { days_overdue: i64 },
    /// Defaulted, but nothing on or after today to carry the balance
    NoAnchorInstallment,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotStarted => write!(f, "loan has not started"),
            SkipReason::LoanClosed => write!(f, "loan is closed"),
            SkipReason::NoCurrentInstallment => write!(f, "no active pending installment"),
            SkipReason::NotYetDue => write!(f, "current installment not yet due"),
            SkipReason::NoDefault => write!(f, "no defaulted installment"),
            SkipReason::NoScheme => write!(f, "loan has no penalty scheme"),
            SkipReason::NoPenaltySlab { days_overdue } => {
                write!(f, "no penalty slab for {} days overdue", days_overdue)
            }
            SkipReason::NoAnchorInstallment => write!(f, "no future installment to update"),
        }
    }
}

/// Result of processing one loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanOutcome {
    Updated,
    Unchanged,
    Skipped(SkipReason),
    Failed,
}

/// Totals of one job run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub examined: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &LoanOutcome) {
        self.examined += 1;
        match outcome {
            LoanOutcome::Updated => self.updated += 1,
            LoanOutcome::Unchanged => self.unchanged += 1,
            LoanOutcome::Skipped(_) => self.skipped += 1,
            LoanOutcome::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_each_outcome() {
        let mut summary = RunSummary::default();
        summary.record(&LoanOutcome::Updated);
        summary.record(&LoanOutcome::Skipped(SkipReason::NoPenaltySlab { days_overdue: 35 }));
        summary.record(&LoanOutcome::Failed);
        summary.record(&LoanOutcome::Unchanged);

        assert_eq!(summary.examined, 4);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unchanged, 1);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::NoPenaltySlab { days_overdue: 35 }.to_string(),
            "no penalty slab for 35 days overdue"
        );
    }
}
