//! Payment validation and the balance arithmetic of a recorded payment

use rust_decimal::Decimal;

use super::interest::{is_settled, round_money};
use super::model::{Installment, Loan};
use crate::error::LedgerError;

/// What applying a payment does to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPlan {
    pub principal: Decimal,
    pub interest: Decimal,
    /// Installment balance after the principal is applied
    pub new_balance: Decimal,
    /// Loan principal still owed after the payment
    pub remaining_principal: Decimal,
    /// Both the installment and the loan are settled
    pub closes_loan: bool,
}

/// Amount checks that need no ledger state
pub fn validate_amounts(principal: Decimal, interest: Decimal) -> Result<(), LedgerError> {
    if principal < Decimal::ZERO || interest < Decimal::ZERO {
        return Err(LedgerError::invalid_amount(
            "Payment amounts cannot be negative",
        ));
    }
    if principal <= Decimal::ZERO && interest <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(
            "A positive principal or interest payment is required",
        ));
    }
    Ok(())
}

pub fn plan_payment(
    loan: &Loan,
    installment: &Installment,
    principal: Decimal,
    interest: Decimal,
) -> Result<PaymentPlan, LedgerError> {
    let principal = round_money(principal);
    let interest = round_money(interest);
    validate_amounts(principal, interest)?;

    if principal > installment.loan_balance {
        return Err(LedgerError::invalid_amount(format!(
            "Principal payment {} exceeds the installment balance {}",
            principal, installment.loan_balance
        )));
    }
    if loan.principal_amount_paid + principal > loan.net_amount_issued {
        return Err(LedgerError::invalid_amount(format!(
            "Principal payment {} exceeds the remaining principal {}",
            principal,
            loan.remaining_principal()
        )));
    }

    let new_balance = installment.loan_balance - principal;
    let remaining_principal = loan.remaining_principal() - principal;
    Ok(PaymentPlan {
        principal,
        interest,
        new_balance,
        remaining_principal,
        closes_loan: is_settled(new_balance) && is_settled(remaining_principal),
    })
}
