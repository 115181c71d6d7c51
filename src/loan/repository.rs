//! Typed data access for loans, installments and ornaments
//!
//! Every statement is parameterized. Functions that mutate take a
//! `&mut PgConnection` so callers run them inside their own transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::model::{
    CompletionStatus, Installment, Loan, LoanSummary, Ornament, OrnamentInput, PaymentStatus,
};

/// Fields of a loan row at origination
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub customer_id: i64,
    pub scheme_id: Option<i64>,
    pub eligible_amount: Decimal,
    pub amount_issued: Decimal,
    pub processing_fee: Decimal,
    pub net_amount_issued: Decimal,
    pub interest_rate: Decimal,
    pub loan_datetime: DateTime<Utc>,
    pub due_date: NaiveDate,
}

/// Fields of a freshly scheduled installment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstallment {
    pub loan_id: i64,
    pub payment_month: NaiveDate,
    pub loan_balance: Decimal,
    pub interest_amount_due: Decimal,
    pub remarks: String,
}

// ===== Loans =====

/// Lock the loan row for the rest of the transaction
pub async fn lock_loan(conn: &mut PgConnection, loan_id: i64) -> Result<Option<Loan>, sqlx::Error> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE loan_id = $1 FOR UPDATE")
        .bind(loan_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_loan(pool: &PgPool, loan_id: i64) -> Result<Option<Loan>, sqlx::Error> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE loan_id = $1")
        .bind(loan_id)
        .fetch_optional(pool)
        .await
}

pub async fn pending_loan_ids(pool: &PgPool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT loan_id FROM loans WHERE completion_status = 'Pending' ORDER BY loan_id",
    )
    .fetch_all(pool)
    .await
}

pub async fn pending_scheme_loan_ids(pool: &PgPool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT loan_id FROM loans
        WHERE completion_status = 'Pending' AND scheme_id IS NOT NULL
        ORDER BY loan_id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn customer_exists(
    conn: &mut PgConnection,
    customer_id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE customer_id = $1)")
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn insert_loan(conn: &mut PgConnection, loan: &NewLoan) -> Result<Loan, sqlx::Error> {
    sqlx::query_as::<_, Loan>(
        r#"
        INSERT INTO loans (
            customer_id, scheme_id, eligible_amount, amount_issued, processing_fee,
            net_amount_issued, interest_rate, current_interest_rate,
            loan_datetime, due_date, completion_status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(loan.customer_id)
    .bind(loan.scheme_id)
    .bind(loan.eligible_amount)
    .bind(loan.amount_issued)
    .bind(loan.processing_fee)
    .bind(loan.net_amount_issued)
    .bind(loan.interest_rate)
    .bind(loan.loan_datetime)
    .bind(loan.due_date)
    .bind(CompletionStatus::Pending)
    .fetch_one(&mut *conn)
    .await
}

pub async fn add_principal_paid(
    conn: &mut PgConnection,
    loan_id: i64,
    amount: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE loans
        SET principal_amount_paid = principal_amount_paid + $1, updated_on = NOW()
        WHERE loan_id = $2
        "#,
    )
    .bind(amount)
    .bind(loan_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn complete_loan(conn: &mut PgConnection, loan_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE loans
        SET completion_status = $1, current_installment_id = NULL, updated_on = NOW()
        WHERE loan_id = $2
        "#,
    )
    .bind(CompletionStatus::Completed)
    .bind(loan_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_current_installment(
    conn: &mut PgConnection,
    loan_id: i64,
    payment_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE loans SET current_installment_id = $1, updated_on = NOW() WHERE loan_id = $2",
    )
    .bind(payment_id)
    .bind(loan_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_current_rate(
    conn: &mut PgConnection,
    loan_id: i64,
    rate: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE loans SET current_interest_rate = $1, updated_on = NOW() WHERE loan_id = $2",
    )
    .bind(rate)
    .bind(loan_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn apply_penalty_rate(
    conn: &mut PgConnection,
    loan_id: i64,
    rate: Decimal,
    applied_on: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE loans
        SET current_interest_rate = $1, penalty_applied_on = $2, updated_on = NOW()
        WHERE loan_id = $3
        "#,
    )
    .bind(rate)
    .bind(applied_on)
    .bind(loan_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_loans(
    pool: &PgPool,
    status: Option<CompletionStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<LoanSummary>, sqlx::Error> {
    let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        r#"
        SELECT
            l.loan_id, l.customer_id, c.customer_name, l.net_amount_issued,
            l.principal_amount_paid, l.interest_rate, l.current_interest_rate,
            l.loan_datetime, l.due_date, l.completion_status,
            COALESCE(SUM(p.interest_amount_paid), 0) AS interest_paid
        FROM loans l
        JOIN customers c ON c.customer_id = l.customer_id
        LEFT JOIN loan_payments p ON p.loan_id = l.loan_id
        WHERE 1=1
        "#,
    );

    if let Some(status) = status {
        query_builder.push(" AND l.completion_status = ");
        query_builder.push_bind(status);
    }

    query_builder.push(" GROUP BY l.loan_id, c.customer_name ORDER BY l.loan_datetime DESC LIMIT ");
    query_builder.push_bind(limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    query_builder
        .build_query_as::<LoanSummary>()
        .fetch_all(pool)
        .await
}

pub async fn count_loans(
    pool: &PgPool,
    status: Option<CompletionStatus>,
) -> Result<i64, sqlx::Error> {
    let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT COUNT(*) FROM loans WHERE 1=1");

    if let Some(status) = status {
        count_builder.push(" AND completion_status = ");
        count_builder.push_bind(status);
    }

    count_builder.build_query_scalar().fetch_one(pool).await
}

// ===== Installments =====

pub async fn fetch_installment(
    conn: &mut PgConnection,
    payment_id: i64,
) -> Result<Option<Installment>, sqlx::Error> {
    sqlx::query_as::<_, Installment>("SELECT * FROM loan_payments WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn installments_for_loan(
    pool: &PgPool,
    loan_id: i64,
) -> Result<Vec<Installment>, sqlx::Error> {
    sqlx::query_as::<_, Installment>(
        "SELECT * FROM loan_payments WHERE loan_id = $1 ORDER BY payment_month, payment_id",
    )
    .bind(loan_id)
    .fetch_all(pool)
    .await
}

/// The installment the loan points at, if it is still active and Pending
pub async fn current_installment(
    conn: &mut PgConnection,
    loan: &Loan,
) -> Result<Option<Installment>, sqlx::Error> {
    let Some(payment_id) = loan.current_installment_id else {
        return Ok(None);
    };

    sqlx::query_as::<_, Installment>(
        r#"
        SELECT * FROM loan_payments
        WHERE payment_id = $1 AND loan_id = $2 AND is_active = TRUE AND payment_status = $3
        "#,
    )
    .bind(payment_id)
    .bind(loan.loan_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(&mut *conn)
    .await
}

/// Earliest active Pending installment other than `excluding`
pub async fn earliest_pending_installment(
    conn: &mut PgConnection,
    loan_id: i64,
    excluding: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT payment_id FROM loan_payments
        WHERE loan_id = $1 AND payment_id <> $2 AND is_active = TRUE AND payment_status = $3
        ORDER BY payment_month, payment_id
        LIMIT 1
        "#,
    )
    .bind(loan_id)
    .bind(excluding)
    .bind(PaymentStatus::Pending)
    .fetch_optional(&mut *conn)
    .await
}

/// Earliest installment that still accepts payments (Pending or Overdue)
pub async fn earliest_payable_installment(
    conn: &mut PgConnection,
    loan_id: i64,
) -> Result<Option<Installment>, sqlx::Error> {
    sqlx::query_as::<_, Installment>(
        r#"
        SELECT * FROM loan_payments
        WHERE loan_id = $1 AND is_active = TRUE AND payment_status IN ('Pending', 'Overdue')
        ORDER BY payment_month, payment_id
        LIMIT 1
        "#,
    )
    .bind(loan_id)
    .fetch_optional(&mut *conn)
    .await
}

/// When the most recent installment was paid
pub async fn last_paid_at(
    conn: &mut PgConnection,
    loan_id: i64,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(payment_date) FROM loan_payments WHERE loan_id = $1 AND payment_status = $2",
    )
    .bind(loan_id)
    .bind(PaymentStatus::Paid)
    .fetch_one(&mut *conn)
    .await
}

/// Due month of the earliest active Pending installment before `today`
pub async fn first_default_month(
    conn: &mut PgConnection,
    loan_id: i64,
    today: NaiveDate,
) -> Result<Option<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT payment_month FROM loan_payments
        WHERE loan_id = $1 AND payment_status = $2 AND is_active = TRUE AND payment_month < $3
        ORDER BY payment_month
        LIMIT 1
        "#,
    )
    .bind(loan_id)
    .bind(PaymentStatus::Pending)
    .bind(today)
    .fetch_optional(&mut *conn)
    .await
}

/// Next payable installment due on or after `today`
pub async fn next_payable_from(
    conn: &mut PgConnection,
    loan_id: i64,
    today: NaiveDate,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT payment_id FROM loan_payments
        WHERE loan_id = $1 AND payment_month >= $2 AND is_active = TRUE
          AND payment_status IN ('Pending', 'Overdue')
        ORDER BY payment_month, payment_id
        LIMIT 1
        "#,
    )
    .bind(loan_id)
    .bind(today)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_installment(
    conn: &mut PgConnection,
    installment: &NewInstallment,
) -> Result<Installment, sqlx::Error> {
    sqlx::query_as::<_, Installment>(
        r#"
        INSERT INTO loan_payments (
            loan_id, payment_month, loan_balance, interest_amount_due,
            payment_status, remarks, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        RETURNING *
        "#,
    )
    .bind(installment.loan_id)
    .bind(installment.payment_month)
    .bind(installment.loan_balance)
    .bind(installment.interest_amount_due)
    .bind(PaymentStatus::Pending)
    .bind(&installment.remarks)
    .fetch_one(&mut *conn)
    .await
}

pub async fn set_installment_interest(
    conn: &mut PgConnection,
    payment_id: i64,
    interest_due: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE loan_payments SET interest_amount_due = $1, updated_on = NOW()
        WHERE payment_id = $2
        "#,
    )
    .bind(interest_due)
    .bind(payment_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Finalize interest and flag the installment Overdue; it stays active
pub async fn mark_overdue(
    conn: &mut PgConnection,
    payment_id: i64,
    interest_due: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE loan_payments
        SET interest_amount_due = $1, payment_status = $2,
            remarks = 'Overdue interest finalized', updated_on = NOW()
        WHERE payment_id = $3
        "#,
    )
    .bind(interest_due)
    .bind(PaymentStatus::Overdue)
    .bind(payment_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn apply_payment(
    conn: &mut PgConnection,
    payment_id: i64,
    principal: Decimal,
    interest: Decimal,
    new_balance: Decimal,
    payment_mode: Option<&str>,
    remarks: Option<&str>,
    paid_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE loan_payments
        SET principal_amount_paid = principal_amount_paid + $1,
            interest_amount_paid = interest_amount_paid + $2,
            loan_balance = $3,
            payment_status = $4,
            payment_date = $5,
            payment_mode = $6,
            remarks = COALESCE($7, remarks),
            updated_on = NOW()
        WHERE payment_id = $8
        "#,
    )
    .bind(principal)
    .bind(interest)
    .bind(new_balance)
    .bind(PaymentStatus::Paid)
    .bind(paid_at)
    .bind(payment_mode)
    .bind(remarks)
    .bind(payment_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deactivate every other open installment of a closed loan
pub async fn close_open_installments(
    conn: &mut PgConnection,
    loan_id: i64,
    except_payment_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE loan_payments
        SET is_active = FALSE, remarks = 'Loan Closed', updated_on = NOW()
        WHERE loan_id = $1 AND payment_id <> $2
          AND payment_status IN ('Pending', 'Overdue')
        "#,
    )
    .bind(loan_id)
    .bind(except_payment_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Carry a reduced balance onto the other open installments
pub async fn propagate_balance(
    conn: &mut PgConnection,
    loan_id: i64,
    except_payment_id: i64,
    balance: Decimal,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE loan_payments
        SET loan_balance = $1, updated_on = NOW()
        WHERE loan_id = $2 AND payment_id <> $3 AND is_active = TRUE
          AND payment_status IN ('Pending', 'Overdue')
        "#,
    )
    .bind(balance)
    .bind(loan_id)
    .bind(except_payment_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn deactivate_past_installments(
    conn: &mut PgConnection,
    loan_id: i64,
    today: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE loan_payments
        SET is_active = FALSE, updated_on = NOW()
        WHERE loan_id = $1 AND payment_month < $2 AND is_active = TRUE
          AND payment_status IN ('Pending', 'Overdue')
        "#,
    )
    .bind(loan_id)
    .bind(today)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn reprice_future_installments(
    conn: &mut PgConnection,
    loan_id: i64,
    today: NaiveDate,
    interest_due: Decimal,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE loan_payments
        SET interest_amount_due = $1, remarks = 'Recalculated-Penalty', updated_on = NOW()
        WHERE loan_id = $2 AND payment_month >= $3 AND is_active = TRUE
          AND payment_status IN ('Pending', 'Overdue')
        "#,
    )
    .bind(interest_due)
    .bind(loan_id)
    .bind(today)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_installment_balance(
    conn: &mut PgConnection,
    payment_id: i64,
    balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE loan_payments SET loan_balance = $1, updated_on = NOW() WHERE payment_id = $2",
    )
    .bind(balance)
    .bind(payment_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Only the anchor keeps principal; every other future installment drops to zero
pub async fn zero_other_future_balances(
    conn: &mut PgConnection,
    loan_id: i64,
    anchor_payment_id: i64,
    today: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE loan_payments
        SET loan_balance = 0, updated_on = NOW()
        WHERE loan_id = $1 AND payment_id <> $2 AND payment_month >= $3 AND is_active = TRUE
          AND payment_status IN ('Pending', 'Overdue')
        "#,
    )
    .bind(loan_id)
    .bind(anchor_payment_id)
    .bind(today)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

// ===== Ornaments =====

pub async fn insert_ornament(
    conn: &mut PgConnection,
    loan_id: i64,
    ornament: &OrnamentInput,
) -> Result<Ornament, sqlx::Error> {
    sqlx::query_as::<_, Ornament>(
        r#"
        INSERT INTO loan_ornaments (
            loan_id, ornament_id, ornament_type, ornament_name, grams, karat
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(loan_id)
    .bind(ornament.ornament_id)
    .bind(&ornament.ornament_type)
    .bind(&ornament.ornament_name)
    .bind(ornament.grams)
    .bind(&ornament.karat)
    .fetch_one(&mut *conn)
    .await
}

pub async fn ornaments_for_loan(pool: &PgPool, loan_id: i64) -> Result<Vec<Ornament>, sqlx::Error> {
    sqlx::query_as::<_, Ornament>(
        "SELECT * FROM loan_ornaments WHERE loan_id = $1 ORDER BY loan_ornament_id",
    )
    .bind(loan_id)
    .fetch_all(pool)
    .await
}
