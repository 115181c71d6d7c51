//! Ledger consistency tests against a real database
//!
//! Run with `TEST_DATABASE_URL` pointing at a scratch Postgres database.
//! The jobs walk every pending loan, so these run one at a time:
//! `cargo test -- --ignored --test-threads=1`

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, FixedOffset, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;

    use goldledger_server::db;
    use goldledger_server::error::LedgerError;
    use goldledger_server::jobs::accrual::OVERDUE_INSTALLMENT_REMARKS;
    use goldledger_server::jobs::{AccrualJob, PenaltyJob};
    use goldledger_server::loan::interest::{business_date, next_month};
    use goldledger_server::loan::repository::{self as repo, NewInstallment};
    use goldledger_server::loan::{
        CompletionStatus, CreateLoanRequest, LoanDetail, LoanService, OrnamentInput,
        PaymentStatus, RecordPaymentRequest,
    };
    use goldledger_server::scheme::{SchemeDetail, SchemeRequest, SchemeService, Slab};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/goldledger_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool).await.expect("Failed to migrate");
        pool
    }

    async fn seed_customer(pool: &PgPool) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO customers (customer_name, phone) VALUES ($1, $2) RETURNING customer_id",
        )
        .bind("Test Customer")
        .bind("919876543210")
        .fetch_one(pool)
        .await
        .expect("Failed to seed customer")
    }

    async fn originate(
        service: &LoanService,
        customer_id: i64,
        scheme_id: Option<i64>,
        loan_datetime: DateTime<Utc>,
    ) -> LoanDetail {
        let request = CreateLoanRequest {
            customer_id,
            scheme_id,
            interest_rate: dec!(12),
            loan_datetime,
            due_date: business_date(loan_datetime, ist()) + Duration::days(365),
            eligible_amount: dec!(120000),
            amount_issued: dec!(100500),
            processing_fee: dec!(500),
            ornaments: vec![OrnamentInput {
                ornament_id: None,
                ornament_type: "Bangle".to_string(),
                ornament_name: "Plain bangle".to_string(),
                grams: dec!(40.250),
                karat: "22K".to_string(),
            }],
        };
        service.originate(request).await.expect("Failed to originate loan")
    }

    async fn create_scheme(pool: &PgPool, name: &str, slabs: Vec<Slab>) -> SchemeDetail {
        SchemeService::new(pool.clone())
            .create_scheme(SchemeRequest {
                scheme_name: name.to_string(),
                description: None,
                slabs,
            })
            .await
            .expect("Failed to create scheme")
    }

    fn pay(principal: Decimal, interest: Decimal) -> RecordPaymentRequest {
        RecordPaymentRequest {
            principal_payment: Some(principal),
            interest_payment: Some(interest),
            payment_mode: Some("Cash".to_string()),
            remarks: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_origination_creates_first_installment() {
        let pool = setup_test_db().await;
        let service = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;

        let detail = originate(&service, customer_id, None, Utc::now()).await;

        assert_eq!(detail.loan.net_amount_issued, dec!(100000));
        assert_eq!(detail.installments.len(), 1);
        let first = &detail.installments[0];
        assert_eq!(first.interest_amount_due, dec!(493.15));
        assert_eq!(first.loan_balance, dec!(100000));
        assert_eq!(detail.loan.current_installment_id, Some(first.payment_id));
        assert_eq!(detail.ornaments.len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_exact_payment_closes_loan_and_rejects_repeat() {
        let pool = setup_test_db().await;
        let service = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let detail = originate(&service, customer_id, None, Utc::now()).await;
        let loan_id = detail.loan.loan_id;
        let payment_id = detail.installments[0].payment_id;

        let receipt = service
            .record_payment(loan_id, payment_id, pay(dec!(100000), dec!(493.15)))
            .await
            .unwrap();
        assert_eq!(receipt.completion_status, CompletionStatus::Completed);

        let after = service.get_loan(loan_id).await.unwrap();
        assert_eq!(after.loan.principal_amount_paid, dec!(100000));
        assert_eq!(after.loan.current_installment_id, None);
        assert_eq!(after.installments[0].payment_status, PaymentStatus::Paid);

        let repeat = service
            .record_payment(loan_id, payment_id, pay(dec!(1), dec!(0)))
            .await;
        assert!(matches!(repeat, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_overpayment_leaves_ledger_untouched() {
        let pool = setup_test_db().await;
        let service = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let detail = originate(&service, customer_id, None, Utc::now()).await;
        let loan_id = detail.loan.loan_id;

        let result = service
            .record_payment(
                loan_id,
                detail.installments[0].payment_id,
                pay(dec!(100000.01), dec!(0)),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));

        let after = service.get_loan(loan_id).await.unwrap();
        assert_eq!(after.loan.principal_amount_paid, Decimal::ZERO);
        assert_eq!(after.installments[0].payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_accrual_charges_pro_rata_on_day_twenty() {
        let pool = setup_test_db().await;
        let service = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let start = Utc::now();
        let detail = originate(&service, customer_id, None, start).await;

        let job = AccrualJob::new(pool.clone(), ist());
        job.run_at(start + Duration::days(20)).await.unwrap();

        let after = service.get_loan(detail.loan.loan_id).await.unwrap();
        assert_eq!(after.installments[0].interest_amount_due, dec!(657.53));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_penalty_consolidates_balance_onto_anchor() {
        let pool = setup_test_db().await;
        let loans = LoanService::new(pool.clone(), ist());
        let schemes = SchemeService::new(pool.clone());
        let customer_id = seed_customer(&pool).await;

        let scheme = schemes
            .create_scheme(SchemeRequest {
                scheme_name: "Penalty test".to_string(),
                description: None,
                slabs: vec![Slab::new(1, 30, dec!(12)), Slab::new(31, 60, dec!(18))],
            })
            .await
            .unwrap();

        let now = Utc::now();
        let today = business_date(now, ist());
        let scheme_id = Some(scheme.scheme.scheme_id);
        let detail = originate(&loans, customer_id, scheme_id, now - Duration::days(76)).await;
        let loan_id = detail.loan.loan_id;
        let defaulted_id = detail.installments[0].payment_id;

        let mut conn = pool.acquire().await.unwrap();
        let mut future_ids = Vec::new();
        let mut month = today + Duration::days(10);
        for _ in 0..2 {
            let inst = repo::insert_installment(
                &mut conn,
                &NewInstallment {
                    loan_id,
                    payment_month: month,
                    loan_balance: dec!(100000),
                    interest_amount_due: dec!(1000),
                    remarks: "Scheduled".to_string(),
                },
            )
            .await
            .unwrap();
            future_ids.push(inst.payment_id);
            month = next_month(month).unwrap();
        }
        drop(conn);

        let summary = PenaltyJob::new(pool.clone(), ist()).run_at(now).await.unwrap();
        assert_eq!(summary.failed, 0);

        let after = loans.get_loan(loan_id).await.unwrap();
        assert_eq!(after.loan.current_interest_rate, dec!(18));
        assert_eq!(after.loan.penalty_applied_on, Some(today));
        assert_eq!(after.loan.current_installment_id, Some(future_ids[0]));

        for inst in &after.installments {
            if inst.payment_id == defaulted_id {
                assert!(!inst.is_active);
            } else if inst.payment_id == future_ids[0] {
                assert_eq!(inst.loan_balance, dec!(100000));
                assert_eq!(inst.interest_amount_due, dec!(1500.00));
            } else {
                assert_eq!(inst.loan_balance, Decimal::ZERO);
                assert_eq!(inst.interest_amount_due, dec!(1500.00));
            }
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_scheme_in_use_cannot_be_deleted() {
        let pool = setup_test_db().await;
        let loans = LoanService::new(pool.clone(), ist());
        let schemes = SchemeService::new(pool.clone());
        let customer_id = seed_customer(&pool).await;

        let scheme = schemes
            .create_scheme(SchemeRequest {
                scheme_name: "In use".to_string(),
                description: Some("Held by a pending loan".to_string()),
                slabs: vec![Slab::new(1, 90, dec!(15))],
            })
            .await
            .unwrap();
        originate(&loans, customer_id, Some(scheme.scheme.scheme_id), Utc::now()).await;

        let result = schemes.delete_scheme(scheme.scheme.scheme_id).await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_accrual_finalizes_overdue_installment() {
        let pool = setup_test_db().await;
        let loans = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let scheme = create_scheme(&pool, "Overdue", vec![Slab::new(1, 60, dec!(18))]).await;

        let now = Utc::now();
        let scheme_id = Some(scheme.scheme.scheme_id);
        let detail = originate(&loans, customer_id, scheme_id, now - Duration::days(40)).await;
        let loan_id = detail.loan.loan_id;
        let first = &detail.installments[0];

        AccrualJob::new(pool.clone(), ist()).run_at(now).await.unwrap();

        let after = loans.get_loan(loan_id).await.unwrap();
        assert_eq!(after.loan.current_interest_rate, dec!(18));
        assert_eq!(after.installments.len(), 2);

        let finalized = &after.installments[0];
        assert_eq!(finalized.payment_id, first.payment_id);
        assert_eq!(finalized.payment_status, PaymentStatus::Overdue);
        assert!(finalized.is_active);
        assert_eq!(finalized.interest_amount_due, dec!(1500.00));

        let next = &after.installments[1];
        assert_eq!(next.payment_status, PaymentStatus::Pending);
        assert_eq!(Some(next.payment_month), next_month(first.payment_month));
        assert_eq!(next.loan_balance, dec!(100000));
        assert_eq!(next.remarks.as_deref(), Some(OVERDUE_INSTALLMENT_REMARKS));
        assert_eq!(after.loan.current_installment_id, Some(next.payment_id));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_accrual_past_due_date_clears_pointer() {
        let pool = setup_test_db().await;
        let loans = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let scheme = create_scheme(&pool, "Short term", vec![Slab::new(1, 60, dec!(18))]).await;

        let now = Utc::now();
        let scheme_id = Some(scheme.scheme.scheme_id);
        let detail = originate(&loans, customer_id, scheme_id, now - Duration::days(40)).await;
        let loan_id = detail.loan.loan_id;

        // Loan falls due with its first installment; no month follows it
        sqlx::query("UPDATE loans SET due_date = $1 WHERE loan_id = $2")
            .bind(detail.installments[0].payment_month)
            .bind(loan_id)
            .execute(&pool)
            .await
            .unwrap();

        AccrualJob::new(pool.clone(), ist()).run_at(now).await.unwrap();

        let after = loans.get_loan(loan_id).await.unwrap();
        assert_eq!(after.installments.len(), 1);
        assert_eq!(after.installments[0].payment_status, PaymentStatus::Overdue);
        assert_eq!(after.loan.current_installment_id, None);
        assert_eq!(after.loan.completion_status, CompletionStatus::Pending);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_partial_payment_carries_balance_forward() {
        let pool = setup_test_db().await;
        let service = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let detail = originate(&service, customer_id, None, Utc::now()).await;
        let loan_id = detail.loan.loan_id;
        let first = &detail.installments[0];

        let mut conn = pool.acquire().await.unwrap();
        let second = repo::insert_installment(
            &mut conn,
            &NewInstallment {
                loan_id,
                payment_month: next_month(first.payment_month).unwrap(),
                loan_balance: dec!(100000),
                interest_amount_due: dec!(1000),
                remarks: "Scheduled".to_string(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let receipt = service
            .record_payment(loan_id, first.payment_id, pay(dec!(40000), dec!(493.15)))
            .await
            .unwrap();
        assert_eq!(receipt.completion_status, CompletionStatus::Pending);
        assert_eq!(receipt.loan_balance, dec!(60000));
        assert_eq!(receipt.installments_updated, 1);

        let after = service.get_loan(loan_id).await.unwrap();
        assert_eq!(after.loan.principal_amount_paid, dec!(40000));
        assert_eq!(after.loan.current_installment_id, Some(second.payment_id));
        for inst in &after.installments {
            if inst.payment_id == first.payment_id {
                assert_eq!(inst.payment_status, PaymentStatus::Paid);
                assert_eq!(inst.loan_balance, dec!(60000));
            } else {
                assert_eq!(inst.payment_status, PaymentStatus::Pending);
                assert_eq!(inst.loan_balance, dec!(60000));
            }
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_penalty_without_anchor_changes_nothing() {
        let pool = setup_test_db().await;
        let loans = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let slabs = vec![Slab::new(1, 30, dec!(12)), Slab::new(31, 60, dec!(18))];
        let scheme = create_scheme(&pool, "No anchor", slabs).await;

        let now = Utc::now();
        let scheme_id = Some(scheme.scheme.scheme_id);
        let detail = originate(&loans, customer_id, scheme_id, now - Duration::days(76)).await;
        let loan_id = detail.loan.loan_id;

        PenaltyJob::new(pool.clone(), ist()).run_at(now).await.unwrap();

        let after = loans.get_loan(loan_id).await.unwrap();
        assert_eq!(after.loan.current_interest_rate, dec!(12));
        assert_eq!(after.loan.penalty_applied_on, None);
        assert_eq!(after.loan.current_installment_id, detail.loan.current_installment_id);
        assert_eq!(after.installments.len(), 1);

        let inst = &after.installments[0];
        let before = &detail.installments[0];
        assert!(inst.is_active);
        assert_eq!(inst.payment_status, PaymentStatus::Pending);
        assert_eq!(inst.loan_balance, before.loan_balance);
        assert_eq!(inst.interest_amount_due, before.interest_amount_due);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_failed_loan_does_not_stop_the_run() {
        let pool = setup_test_db().await;
        let service = LoanService::new(pool.clone(), ist());
        let customer_id = seed_customer(&pool).await;
        let start = Utc::now();
        let healthy = originate(&service, customer_id, None, start).await;
        let broken = originate(&service, customer_id, None, start).await;

        // Pro-rata interest on this loan no longer fits NUMERIC(14, 2)
        sqlx::query(
            r#"
            UPDATE loans
            SET eligible_amount = 999999999999.99, amount_issued = 999999999999.99,
                net_amount_issued = 999999999999.99, interest_rate = 9999.99
            WHERE loan_id = $1
            "#,
        )
        .bind(broken.loan.loan_id)
        .execute(&pool)
        .await
        .unwrap();

        let summary = AccrualJob::new(pool.clone(), ist())
            .run_at(start + Duration::days(20))
            .await
            .unwrap();

        let healthy_after = service.get_loan(healthy.loan.loan_id).await.unwrap();
        let broken_after = service.get_loan(broken.loan.loan_id).await.unwrap();

        sqlx::query("UPDATE loans SET completion_status = 'Completed' WHERE loan_id = $1")
            .bind(broken.loan.loan_id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(summary.failed >= 1);
        assert!(summary.updated >= 1);
        assert_eq!(healthy_after.installments[0].interest_amount_due, dec!(657.53));
        assert_eq!(
            broken_after.installments[0].interest_amount_due,
            broken.installments[0].interest_amount_due
        );
    }
}
