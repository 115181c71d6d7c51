//! Investment pool ledger

use rust_decimal::Decimal;
use sqlx::PgPool;
use validator::Validate;

use super::model::{
    apply_movement, InvestmentAction, InvestmentEntry, InvestmentHistory, RecordInvestmentRequest,
};
use crate::error::LedgerError;

/// Advisory lock key serializing writers of `investment_history`
const INVESTMENT_LOCK_KEY: i64 = 0x696e_7665_7374;

#[derive(Clone)]
pub struct InvestmentService {
    db_pool: PgPool,
}

impl InvestmentService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Append a movement; the running balance never goes negative
    pub async fn record(
        &self,
        request: RecordInvestmentRequest,
    ) -> Result<InvestmentEntry, LedgerError> {
        request
            .validate()
            .map_err(|e| LedgerError::validation(e.to_string()))?;
        // reject bad amounts before opening a transaction
        apply_movement(Decimal::ZERO, request.amount, InvestmentAction::Add)?;

        let mut tx = self.db_pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(INVESTMENT_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let last_balance: Decimal = sqlx::query_scalar::<_, Decimal>(
            "SELECT current_balance FROM investment_history ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(Decimal::ZERO);

        let (signed, new_balance) = apply_movement(last_balance, request.amount, request.action)?;

        let entry = sqlx::query_as::<_, InvestmentEntry>(
            r#"
            INSERT INTO investment_history (amount_added, current_balance, remarks)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(signed)
        .bind(new_balance)
        .bind(request.remarks.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            entry_id = entry.id,
            amount = %signed,
            balance = %new_balance,
            "Investment movement recorded"
        );
        Ok(entry)
    }

    pub async fn history(&self) -> Result<InvestmentHistory, LedgerError> {
        let transactions = sqlx::query_as::<_, InvestmentEntry>(
            "SELECT * FROM investment_history ORDER BY id DESC",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let grand_total = transactions
            .first()
            .map(|entry| entry.current_balance)
            .unwrap_or(Decimal::ZERO);

        Ok(InvestmentHistory {
            transactions,
            grand_total,
        })
    }
}
