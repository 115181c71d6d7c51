//! Loan service layer - origination, queries and the payment recorder

use chrono::{FixedOffset, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::interest::{business_date, initial_interest, next_month};
use super::model::{
    CompletionStatus, CreateLoanRequest, Installment, ListLoansQuery, LoanDetail, LoanSummary,
    NextPaymentDue, PaymentReceipt, RecordPaymentRequest,
};
use super::payment::{plan_payment, validate_amounts};
use super::repository::{self as repo, NewInstallment, NewLoan};
use crate::error::LedgerError;
use crate::models::PaginatedResponse;
use crate::scheme::repository as scheme_repo;

pub const INITIAL_INSTALLMENT_REMARKS: &str = "Initial 15-day interest";

/// Loan service for originating loans and recording payments
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
    business_offset: FixedOffset,
}

impl LoanService {
    pub fn new(db_pool: PgPool, business_offset: FixedOffset) -> Self {
        Self {
            db_pool,
            business_offset,
        }
    }

    /// Create a loan, its ornaments and the first installment in one transaction
    pub async fn originate(&self, request: CreateLoanRequest) -> Result<LoanDetail, LedgerError> {
        request.validate_terms()?;

        let loan_date = business_date(request.loan_datetime, self.business_offset);
        if request.due_date <= loan_date {
            return Err(LedgerError::validation(
                "Due date must fall after the loan date",
            ));
        }
        let first_month = next_month(loan_date)
            .ok_or_else(|| LedgerError::validation("Loan date is out of range"))?;

        let net = request.net_amount();
        let mut tx = self.db_pool.begin().await?;

        if !repo::customer_exists(&mut tx, request.customer_id).await? {
            return Err(LedgerError::not_found(format!(
                "Customer #{}",
                request.customer_id
            )));
        }
        if let Some(scheme_id) = request.scheme_id {
            if !scheme_repo::scheme_exists(&mut tx, scheme_id).await? {
                return Err(LedgerError::not_found(format!("Scheme #{}", scheme_id)));
            }
        }

        let mut loan = repo::insert_loan(
            &mut tx,
            &NewLoan {
                customer_id: request.customer_id,
                scheme_id: request.scheme_id,
                eligible_amount: request.eligible_amount,
                amount_issued: request.amount_issued,
                processing_fee: request.processing_fee,
                net_amount_issued: net,
                interest_rate: request.interest_rate,
                loan_datetime: request.loan_datetime,
                due_date: request.due_date,
            },
        )
        .await?;

        let mut ornaments = Vec::with_capacity(request.ornaments.len());
        for ornament in &request.ornaments {
            ornaments.push(repo::insert_ornament(&mut tx, loan.loan_id, ornament).await?);
        }

        let first = repo::insert_installment(
            &mut tx,
            &NewInstallment {
                loan_id: loan.loan_id,
                payment_month: first_month,
                loan_balance: net,
                interest_amount_due: initial_interest(net, request.interest_rate),
                remarks: INITIAL_INSTALLMENT_REMARKS.to_string(),
            },
        )
        .await?;
        repo::set_current_installment(&mut tx, loan.loan_id, Some(first.payment_id)).await?;
        loan.current_installment_id = Some(first.payment_id);

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.loan_id,
            customer_id = loan.customer_id,
            net_amount_issued = %net,
            payment_id = first.payment_id,
            "Loan originated"
        );

        Ok(LoanDetail {
            loan,
            installments: vec![first],
            ornaments,
        })
    }

    pub async fn get_loan(&self, loan_id: i64) -> Result<LoanDetail, LedgerError> {
        let loan = repo::fetch_loan(&self.db_pool, loan_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Loan #{}", loan_id)))?;
        let installments = repo::installments_for_loan(&self.db_pool, loan_id).await?;
        let ornaments = repo::ornaments_for_loan(&self.db_pool, loan_id).await?;

        Ok(LoanDetail {
            loan,
            installments,
            ornaments,
        })
    }

    pub async fn list_loans(
        &self,
        query: ListLoansQuery,
    ) -> Result<PaginatedResponse<LoanSummary>, LedgerError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (i64::from(page) - 1) * i64::from(limit);

        let total = repo::count_loans(&self.db_pool, query.status).await?;
        let items =
            repo::list_loans(&self.db_pool, query.status, i64::from(limit), offset).await?;

        Ok(PaginatedResponse {
            data: items,
            total,
            page: page as i32,
            limit: limit as i32,
        })
    }

    /// The installment a customer should pay next, with the amount owed on it
    pub async fn next_payment_due(&self, loan_id: i64) -> Result<NextPaymentDue, LedgerError> {
        let loan = repo::fetch_loan(&self.db_pool, loan_id)
            .await?
            .filter(|loan| loan.is_pending())
            .ok_or_else(|| LedgerError::not_found(format!("Pending loan #{}", loan_id)))?;

        let mut conn = self.db_pool.acquire().await?;

        let installment = match repo::current_installment(&mut conn, &loan).await? {
            Some(installment) => installment,
            None => repo::earliest_payable_installment(&mut conn, loan_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::not_found(format!("Payable installment of loan #{}", loan_id))
                })?,
        };

        Ok(next_due_from(&installment))
    }

    /// Record a payment against one installment of a loan.
    ///
    /// The loan row is locked first; every write happens in the same
    /// transaction and is rolled back on any failure.
    pub async fn record_payment(
        &self,
        loan_id: i64,
        payment_id: i64,
        request: RecordPaymentRequest,
    ) -> Result<PaymentReceipt, LedgerError> {
        let principal = request.principal_payment.unwrap_or(Decimal::ZERO);
        let interest = request.interest_payment.unwrap_or(Decimal::ZERO);
        validate_amounts(principal, interest)?;

        let mut tx = self.db_pool.begin().await?;

        let loan = repo::lock_loan(&mut tx, loan_id)
            .await?
            .filter(|loan| loan.is_pending())
            .ok_or_else(|| LedgerError::not_found(format!("Pending loan #{}", loan_id)))?;

        let installment = repo::fetch_installment(&mut tx, payment_id)
            .await?
            .filter(|i| i.loan_id == loan_id && i.is_payable())
            .ok_or_else(|| {
                LedgerError::not_found(format!(
                    "Payable installment #{} of loan #{}",
                    payment_id, loan_id
                ))
            })?;

        let plan = plan_payment(&loan, &installment, principal, interest)?;

        repo::apply_payment(
            &mut tx,
            payment_id,
            plan.principal,
            plan.interest,
            plan.new_balance,
            request.payment_mode.as_deref(),
            request.remarks.as_deref(),
            Utc::now(),
        )
        .await?;
        repo::add_principal_paid(&mut tx, loan_id, plan.principal).await?;

        let (completion_status, installments_updated) = if plan.closes_loan {
            let closed = repo::close_open_installments(&mut tx, loan_id, payment_id).await?;
            repo::complete_loan(&mut tx, loan_id).await?;
            (CompletionStatus::Completed, closed)
        } else {
            let updated = repo::propagate_balance(
                &mut tx,
                loan_id,
                payment_id,
                plan.remaining_principal,
            )
            .await?;
            if loan.current_installment_id == Some(payment_id) {
                let next = repo::earliest_pending_installment(&mut tx, loan_id, payment_id).await?;
                repo::set_current_installment(&mut tx, loan_id, next).await?;
            }
            (CompletionStatus::Pending, updated)
        };

        tx.commit().await?;

        tracing::info!(
            loan_id,
            payment_id,
            principal = %plan.principal,
            interest = %plan.interest,
            loan_balance = %plan.new_balance,
            closed = plan.closes_loan,
            "Payment recorded"
        );

        Ok(PaymentReceipt {
            loan_id,
            payment_id,
            principal_paid: plan.principal,
            interest_paid: plan.interest,
            loan_balance: plan.new_balance,
            completion_status,
            installments_updated,
        })
    }
}

fn next_due_from(installment: &Installment) -> NextPaymentDue {
    let interest_due = installment.interest_outstanding();
    NextPaymentDue {
        loan_id: installment.loan_id,
        payment_id: installment.payment_id,
        payment_month: installment.payment_month,
        payment_status: installment.payment_status,
        loan_balance: installment.loan_balance,
        interest_due,
        total_due: installment.loan_balance + interest_due,
    }
}
