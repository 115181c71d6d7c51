//! Penalty job: moves loans with a defaulted installment onto their
//! scheme's slab rate and consolidates the balance onto one future
//! installment.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{LoanOutcome, RunSummary, SkipReason};
use crate::error::LedgerError;
use crate::loan::interest::{business_date, monthly_interest};
use crate::loan::repository as repo;
use crate::loan::Loan;
use crate::scheme::{repository as scheme_repo, slab_for, Slab};

/// Rate change and repricing for one defaulted loan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyPlan {
    pub days_overdue: i64,
    pub slab_rate: Decimal,
    pub remaining_principal: Decimal,
    /// Interest written to every active future installment
    pub monthly_interest: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PenaltyDecision {
    Apply(PenaltyPlan),
    Skip(SkipReason),
}

/// `first_default` is the month of the earliest active Pending installment
/// before `today`, if any.
pub fn plan_penalty(
    loan: &Loan,
    first_default: Option<NaiveDate>,
    slabs: &[Slab],
    today: NaiveDate,
) -> PenaltyDecision {
    let Some(first_default) = first_default else {
        return PenaltyDecision::Skip(SkipReason::NoDefault);
    };

    let days_overdue = (today - first_default).num_days();
    if days_overdue <= 0 {
        return PenaltyDecision::Skip(SkipReason::NoDefault);
    }

    let Some(slab) = slab_for(slabs, days_overdue) else {
        return PenaltyDecision::Skip(SkipReason::NoPenaltySlab { days_overdue });
    };

    let remaining_principal = loan.remaining_principal();
    PenaltyDecision::Apply(PenaltyPlan {
        days_overdue,
        slab_rate: slab.interest_rate,
        remaining_principal,
        monthly_interest: monthly_interest(remaining_principal, slab.interest_rate),
    })
}

/// Periodic walk of every Pending loan that has a scheme
#[derive(Clone)]
pub struct PenaltyJob {
    db_pool: PgPool,
    business_offset: FixedOffset,
}

impl PenaltyJob {
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
        let today = business_date(now, self.business_offset);
        tracing::info!(%today, "Starting penalty check for defaulted loans");

        let loan_ids = repo::pending_scheme_loan_ids(&self.db_pool).await?;
        let mut summary = RunSummary::default();

        for loan_id in loan_ids {
            let outcome = match self.process_loan(loan_id, today).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(loan_id, error = %e, "Penalty failed, loan rolled back");
                    LoanOutcome::Failed
                }
            };
            if let LoanOutcome::Skipped(reason) = &outcome {
                match reason {
                    SkipReason::NoPenaltySlab { .. } => {
                        tracing::info!(loan_id, reason = %reason, "No penalty applied")
                    }
                    SkipReason::NoAnchorInstallment => {
                        tracing::warn!(loan_id, reason = %reason, "Penalty rolled back")
                    }
                    _ => tracing::debug!(loan_id, reason = %reason, "Penalty skipped loan"),
                }
            }
            summary.record(&outcome);
        }

        tracing::info!(
            examined = summary.examined,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Penalty check finished"
        );
        Ok(summary)
    }

    async fn process_loan(
        &self,
        loan_id: i64,
        today: NaiveDate,
    ) -> Result<LoanOutcome, LedgerError> {
        let mut tx = self.db_pool.begin().await?;

        let Some(loan) = repo::lock_loan(&mut tx, loan_id)
            .await?
            .filter(|loan| loan.is_pending())
        else {
            return Ok(LoanOutcome::Skipped(SkipReason::LoanClosed));
        };
        let Some(scheme_id) = loan.scheme_id else {
            return Ok(LoanOutcome::Skipped(SkipReason::NoScheme));
        };

        let first_default = repo::first_default_month(&mut tx, loan_id, today).await?;
        if first_default.is_none() {
            return Ok(LoanOutcome::Skipped(SkipReason::NoDefault));
        }
        let slabs = scheme_repo::slabs_for(&mut tx, scheme_id).await?;

        let plan = match plan_penalty(&loan, first_default, &slabs, today) {
            PenaltyDecision::Apply(plan) => plan,
            PenaltyDecision::Skip(reason) => return Ok(LoanOutcome::Skipped(reason)),
        };

        // The anchor has to exist before anything is written
        let Some(anchor_id) = repo::next_payable_from(&mut tx, loan_id, today).await? else {
            return Ok(LoanOutcome::Skipped(SkipReason::NoAnchorInstallment));
        };

        let deactivated = repo::deactivate_past_installments(&mut tx, loan_id, today).await?;
        repo::apply_penalty_rate(&mut tx, loan_id, plan.slab_rate, today).await?;
        let repriced =
            repo::reprice_future_installments(&mut tx, loan_id, today, plan.monthly_interest)
                .await?;
        repo::set_installment_balance(&mut tx, anchor_id, plan.remaining_principal).await?;
        repo::zero_other_future_balances(&mut tx, loan_id, anchor_id, today).await?;
        repo::set_current_installment(&mut tx, loan_id, Some(anchor_id)).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id,
            days_overdue = plan.days_overdue,
            slab_rate = %plan.slab_rate,
            monthly_interest = %plan.monthly_interest,
            anchor_payment_id = anchor_id,
            deactivated,
            repriced,
            "Penalty applied"
        );
        Ok(LoanOutcome::Updated)
    }
}
