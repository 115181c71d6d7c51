//! Investment pool models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::LedgerError;
use crate::loan::interest::round_money;

/// One movement of the investment pool with the balance after it
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvestmentEntry {
    pub id: i64,
    pub added_on: DateTime<Utc>,
    /// Signed: negative for withdrawals
    pub amount_added: Decimal,
    pub current_balance: Decimal,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordInvestmentRequest {
    pub amount: Decimal,
    pub action: InvestmentAction,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

/// Full history, newest first, with the pool's current total
#[derive(Debug, Clone, Serialize)]
pub struct InvestmentHistory {
    pub transactions: Vec<InvestmentEntry>,
    pub grand_total: Decimal,
}

/// Signed movement and resulting balance for a request against `last_balance`
pub fn apply_movement(
    last_balance: Decimal,
    amount: Decimal,
    action: InvestmentAction,
) -> Result<(Decimal, Decimal), LedgerError> {
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount("Investment amount must be positive"));
    }

    let signed = match action {
        InvestmentAction::Add => amount,
        InvestmentAction::Remove => -amount,
    };
    let new_balance = last_balance + signed;
    if new_balance < Decimal::ZERO {
        return Err(LedgerError::invalid_amount(format!(
            "Removal of {} exceeds the current balance {}",
            amount, last_balance
        )));
    }
    Ok((signed, new_balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_add_and_remove() {
        assert_eq!(
            apply_movement(dec!(0), dec!(5000), InvestmentAction::Add).unwrap(),
            (dec!(5000), dec!(5000))
        );
        assert_eq!(
            apply_movement(dec!(5000), dec!(1200.50), InvestmentAction::Remove).unwrap(),
            (dec!(-1200.50), dec!(3799.50))
        );
    }

    #[test]
    fn test_removing_whole_balance_is_allowed() {
        assert_eq!(
            apply_movement(dec!(100), dec!(100), InvestmentAction::Remove).unwrap().1,
            dec!(0)
        );
    }

    #[test]
    fn test_rejects_overdraw_and_non_positive() {
        assert!(matches!(
            apply_movement(dec!(100), dec!(100.01), InvestmentAction::Remove),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            apply_movement(dec!(100), dec!(0), InvestmentAction::Add),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            apply_movement(dec!(100), dec!(-5), InvestmentAction::Add),
            Err(LedgerError::InvalidAmount(_))
        ));
    }
}
