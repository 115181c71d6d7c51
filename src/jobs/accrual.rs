//! Accrual job: keeps the current installment's interest in step with the
//! loan's age and finalizes overdue installments at the penalty rate.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::{LoanOutcome, RunSummary, SkipReason};
use crate::error::LedgerError;
use crate::loan::interest::{
    business_date, monthly_interest, next_month, pro_rata_interest, whole_days_between,
    AccrualStage,
};
use crate::loan::repository::{self as repo, NewInstallment};
use crate::loan::{Installment, Loan};
use crate::scheme::{repository as scheme_repo, slab_for, Slab};

pub const OVERDUE_INSTALLMENT_REMARKS: &str = "Generated after overdue";

/// What the accrual job does to one loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualDecision {
    Unchanged,
    /// Pro-rata interest for the days elapsed so far
    UpdateInterest { interest_due: Decimal },
    Finalize(OverdueFinalization),
    Skip(SkipReason),
}

/// Closing out an overdue installment at the penalty rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueFinalization {
    pub days_overdue: i64,
    pub penalty_rate: Decimal,
    /// Final interest on the overdue installment
    pub interest_due: Decimal,
    /// Follow-up installment; `None` once the loan's due date would be exceeded
    pub next_installment: Option<NewInstallment>,
}

/// Decision for a loan aged 0-30 days
pub fn plan_within_term(
    loan: &Loan,
    installment: &Installment,
    days_since_start: i64,
) -> AccrualDecision {
    match AccrualStage::for_age(days_since_start) {
        AccrualStage::NotStarted => AccrualDecision::Skip(SkipReason::NotStarted),
        AccrualStage::Initial | AccrualStage::Overdue => AccrualDecision::Unchanged,
        AccrualStage::ProRata => {
            let interest_due =
                pro_rata_interest(loan.net_amount_issued, loan.interest_rate, days_since_start);
            if interest_due == installment.interest_amount_due {
                AccrualDecision::Unchanged
            } else {
                AccrualDecision::UpdateInterest { interest_due }
            }
        }
    }
}

/// Decision for a loan past its first 30 days.
///
/// `anchor` is when the last installment was paid, or the loan start when
/// nothing has been paid yet.
pub fn plan_overdue(
    loan: &Loan,
    installment: &Installment,
    slabs: &[Slab],
    anchor: DateTime<Utc>,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> AccrualDecision {
    if installment.payment_month > today {
        return AccrualDecision::Skip(SkipReason::NotYetDue);
    }

    let days_overdue = whole_days_between(anchor, now);
    let Some(slab) = slab_for(slabs, days_overdue) else {
        return AccrualDecision::Skip(SkipReason::NoPenaltySlab { days_overdue });
    };

    let remaining = loan.remaining_principal();
    let interest_due = monthly_interest(remaining, slab.interest_rate);
    let next_installment = next_month(installment.payment_month)
        .filter(|month| *month <= loan.due_date)
        .map(|payment_month| NewInstallment {
            loan_id: loan.loan_id,
            payment_month,
            loan_balance: remaining,
            interest_amount_due: interest_due,
            remarks: OVERDUE_INSTALLMENT_REMARKS.to_string(),
        });

    AccrualDecision::Finalize(OverdueFinalization {
        days_overdue,
        penalty_rate: slab.interest_rate,
        interest_due,
        next_installment,
    })
}

/// Periodic walk of every Pending loan
#[derive(Clone)]
pub struct AccrualJob {
    db_pool: PgPool,
    business_offset: FixedOffset,
}

impl AccrualJob {
    pub fn new(db_pool: PgPool, business_offset: FixedOffset) -> Self {
        Self {
            db_pool,
            business_offset,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, LedgerError> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary, LedgerError> {
        tracing::info!("Starting interest accrual for pending loans");

        let loan_ids = repo::pending_loan_ids(&self.db_pool).await?;
        let mut summary = RunSummary::default();

        for loan_id in loan_ids {
            let outcome = match self.process_loan(loan_id, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(loan_id, error = %e, "Accrual failed, loan rolled back");
                    LoanOutcome::Failed
                }
            };
            if let LoanOutcome::Skipped(reason) = &outcome {
                match reason {
                    SkipReason::NoCurrentInstallment | SkipReason::NoPenaltySlab { .. } => {
                        tracing::warn!(loan_id, reason = %reason, "Accrual skipped loan")
                    }
                    _ => tracing::debug!(loan_id, reason = %reason, "Accrual skipped loan"),
                }
            }
            summary.record(&outcome);
        }

        tracing::info!(
            examined = summary.examined,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Interest accrual finished"
        );
        Ok(summary)
    }

    /// One loan, one transaction; dropping `tx` on any early return rolls back
    async fn process_loan(
        &self,
        loan_id: i64,
        now: DateTime<Utc>,
    ) -> Result<LoanOutcome, LedgerError> {
        let today = business_date(now, self.business_offset);
        let mut tx = self.db_pool.begin().await?;

        let Some(loan) = repo::lock_loan(&mut tx, loan_id)
            .await?
            .filter(|loan| loan.is_pending())
        else {
            return Ok(LoanOutcome::Skipped(SkipReason::LoanClosed));
        };

        let Some(installment) = repo::current_installment(&mut tx, &loan).await? else {
            return Ok(LoanOutcome::Skipped(SkipReason::NoCurrentInstallment));
        };

        let days_since_start = whole_days_between(loan.loan_datetime, now);
        let decision = match AccrualStage::for_age(days_since_start) {
            AccrualStage::Overdue => {
                let slabs = match loan.scheme_id {
                    Some(scheme_id) => scheme_repo::slabs_for(&mut tx, scheme_id).await?,
                    None => Vec::new(),
                };
                let anchor = repo::last_paid_at(&mut tx, loan_id)
                    .await?
                    .unwrap_or(loan.loan_datetime);
                plan_overdue(&loan, &installment, &slabs, anchor, now, today)
            }
            _ => plan_within_term(&loan, &installment, days_since_start),
        };

        let outcome = apply_decision(&mut tx, &loan, &installment, decision).await?;
        if outcome == LoanOutcome::Updated {
            tx.commit().await?;
        }
        Ok(outcome)
    }
}

async fn apply_decision(
    conn: &mut PgConnection,
    loan: &Loan,
    installment: &Installment,
    decision: AccrualDecision,
) -> Result<LoanOutcome, LedgerError> {
    match decision {
        AccrualDecision::Unchanged => Ok(LoanOutcome::Unchanged),
        AccrualDecision::Skip(reason) => Ok(LoanOutcome::Skipped(reason)),
        AccrualDecision::UpdateInterest { interest_due } => {
            repo::set_installment_interest(conn, installment.payment_id, interest_due).await?;
            tracing::info!(
                loan_id = loan.loan_id,
                payment_id = installment.payment_id,
                interest_due = %interest_due,
                "Pro-rata interest updated"
            );
            Ok(LoanOutcome::Updated)
        }
        AccrualDecision::Finalize(plan) => {
            repo::set_current_rate(conn, loan.loan_id, plan.penalty_rate).await?;
            repo::mark_overdue(conn, installment.payment_id, plan.interest_due).await?;

            let next_id = match &plan.next_installment {
                Some(next) => Some(repo::insert_installment(conn, next).await?.payment_id),
                None => {
                    tracing::warn!(
                        loan_id = loan.loan_id,
                        due_date = %loan.due_date,
                        "Next installment would exceed the loan due date; none created"
                    );
                    None
                }
            };
            repo::set_current_installment(conn, loan.loan_id, next_id).await?;

            tracing::info!(
                loan_id = loan.loan_id,
                payment_id = installment.payment_id,
                days_overdue = plan.days_overdue,
                penalty_rate = %plan.penalty_rate,
                interest_due = %plan.interest_due,
                next_payment_id = ?next_id,
                "Overdue installment finalized"
            );
            Ok(LoanOutcome::Updated)
        }
    }
}
