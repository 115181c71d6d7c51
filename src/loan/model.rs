//! Loan ledger models
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Loan completion status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "completion_status", rename_all = "PascalCase")]
pub enum CompletionStatus {
    Pending,
    Completed,
}

/// Installment payment status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "PascalCase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
    Skipped,
}

/// Loan model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub loan_id: i64,
    pub customer_id: i64,
    pub scheme_id: Option<i64>,
    pub eligible_amount: Decimal,
    pub amount_issued: Decimal,
    pub processing_fee: Decimal,
    /// Principal disbursed after fees
    pub net_amount_issued: Decimal,
    pub principal_amount_paid: Decimal,
    /// Original annual rate in percent
    pub interest_rate: Decimal,
    /// Annual rate in force; escalates when a penalty slab applies
    pub current_interest_rate: Decimal,
    pub loan_datetime: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub penalty_applied_on: Option<NaiveDate>,
    pub completion_status: CompletionStatus,
    pub current_installment_id: Option<i64>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Loan {
    pub fn remaining_principal(&self) -> Decimal {
        self.net_amount_issued - self.principal_amount_paid
    }

    pub fn is_pending(&self) -> bool {
        self.completion_status == CompletionStatus::Pending
    }
}

/// Installment (`loan_payments` row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Installment {
    pub payment_id: i64,
    pub loan_id: i64,
    pub payment_month: NaiveDate,
    pub loan_balance: Decimal,
    pub principal_amount_paid: Decimal,
    pub interest_amount_due: Decimal,
    pub interest_amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_mode: Option<String>,
    pub remarks: Option<String>,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Installment {
    /// Only active Pending/Overdue installments accept payments
    pub fn is_payable(&self) -> bool {
        self.is_active
            && matches!(
                self.payment_status,
                PaymentStatus::Pending | PaymentStatus::Overdue
            )
    }

    pub fn interest_outstanding(&self) -> Decimal {
        (self.interest_amount_due - self.interest_amount_paid).max(Decimal::ZERO)
    }
}

/// Pledged ornament
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ornament {
    pub loan_ornament_id: i64,
    pub loan_id: i64,
    pub ornament_id: Option<i64>,
    pub ornament_type: String,
    pub ornament_name: String,
    pub grams: Decimal,
    pub karat: String,
}

/// Ornament supplied with a new loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrnamentInput {
    pub ornament_id: Option<i64>,
    pub ornament_type: String,
    pub ornament_name: String,
    pub grams: Decimal,
    pub karat: String,
}

/// Request to originate a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoanRequest {
    pub customer_id: i64,
    pub scheme_id: Option<i64>,
    pub interest_rate: Decimal,
    pub loan_datetime: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub eligible_amount: Decimal,
    pub amount_issued: Decimal,
    #[serde(default)]
    pub processing_fee: Decimal,
    pub ornaments: Vec<OrnamentInput>,
}

impl CreateLoanRequest {
    /// Checks that need no database access
    pub fn validate_terms(&self) -> Result<(), LedgerError> {
        if self.amount_issued <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("Amount issued must be positive"));
        }
        if self.amount_issued > self.eligible_amount {
            return Err(LedgerError::invalid_amount(format!(
                "Amount issued {} exceeds eligible amount {}",
                self.amount_issued, self.eligible_amount
            )));
        }
        if self.processing_fee < Decimal::ZERO || self.processing_fee >= self.amount_issued {
            return Err(LedgerError::invalid_amount(
                "Processing fee must be non-negative and below the amount issued",
            ));
        }
        if self.interest_rate <= Decimal::ZERO {
            return Err(LedgerError::validation("Interest rate must be positive"));
        }
        if self.ornaments.is_empty() {
            return Err(LedgerError::validation("At least one ornament must be pledged"));
        }
        if let Some(bad) = self
            .ornaments
            .iter()
            .find(|o| o.grams <= Decimal::ZERO || o.ornament_name.trim().is_empty())
        {
            return Err(LedgerError::validation(format!(
                "Ornament '{}' needs a name and a positive weight",
                bad.ornament_name
            )));
        }
        Ok(())
    }

    pub fn net_amount(&self) -> Decimal {
        self.amount_issued - self.processing_fee
    }
}

/// Request to record a payment against one installment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    #[serde(default)]
    pub principal_payment: Option<Decimal>,
    #[serde(default)]
    pub interest_payment: Option<Decimal>,
    pub payment_mode: Option<String>,
    pub remarks: Option<String>,
}

/// Result of a recorded payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub loan_id: i64,
    pub payment_id: i64,
    pub principal_paid: Decimal,
    pub interest_paid: Decimal,
    pub loan_balance: Decimal,
    pub completion_status: CompletionStatus,
    /// Other installments touched by closure or balance propagation
    pub installments_updated: u64,
}

/// Loan with its schedule and pledged ornaments
#[derive(Debug, Clone, Serialize)]
pub struct LoanDetail {
    #[serde(flatten)]
    pub loan: Loan,
    pub installments: Vec<Installment>,
    pub ornaments: Vec<Ornament>,
}

/// Row of the loan listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanSummary {
    pub loan_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub net_amount_issued: Decimal,
    pub principal_amount_paid: Decimal,
    pub interest_rate: Decimal,
    pub current_interest_rate: Decimal,
    pub loan_datetime: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub completion_status: CompletionStatus,
    pub interest_paid: Decimal,
}

/// Amount expected on the current installment
#[derive(Debug, Clone, Serialize)]
pub struct NextPaymentDue {
    pub loan_id: i64,
    pub payment_id: i64,
    pub payment_month: NaiveDate,
    pub payment_status: PaymentStatus,
    pub loan_balance: Decimal,
    pub interest_due: Decimal,
    pub total_due: Decimal,
}

/// Query for listing loans
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    pub status: Option<CompletionStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
