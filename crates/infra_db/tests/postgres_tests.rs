//! PostgreSQL adapter tests
//!
//! These start a PostgreSQL testcontainer and are ignored by default.
//! Run them with `cargo test -p infra_db -- --ignored`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{Money, UserId};
use domain_recharge::{
    InitiateRecharge, InstallmentPayment, InstallmentVerification, OrchestratorConfig,
    PaymentOrchestrator, PaymentStatus, RechargeError, RechargeStore, SandboxGateway,
    VerificationOutcome,
};
use infra_db::{
    PostgresCatalogAdapter, PostgresIdentityAdapter, PostgresRechargeStore, PostgresSettingsAdapter,
};
use test_utils::{
    assert_ledger_balanced, assert_schedule_matches, assert_single_credit, PhoneFixtures,
    PlanFixtures, SettingsFixtures, TestDatabase,
};

struct Stack {
    db: TestDatabase,
    orchestrator: PaymentOrchestrator,
    gateway: Arc<SandboxGateway>,
    store: Arc<PostgresRechargeStore>,
    user: UserId,
}

async fn stack() -> Stack {
    let db = TestDatabase::new().await.expect("database container");
    let pool = db.pool().clone();

    let user = UserId::new_v7();
    db.insert_profile(user, Some(&PhoneFixtures::verified())).await.unwrap();
    db.insert_settings(&SettingsFixtures::standard()).await.unwrap();

    let config = OrchestratorConfig::default();
    let gateway = Arc::new(SandboxGateway::new(config.redirect_base_url.clone()));
    let store = Arc::new(PostgresRechargeStore::new(pool.clone()));
    let orchestrator = PaymentOrchestrator::new(
        Arc::new(PostgresIdentityAdapter::new(pool.clone())),
        Arc::new(PostgresCatalogAdapter::new(pool.clone())),
        Arc::new(PostgresSettingsAdapter::new(pool)),
        gateway.clone(),
        store.clone(),
        config,
    );

    Stack {
        db,
        orchestrator,
        gateway,
        store,
        user,
    }
}

async fn fund_wallet(stack: &Stack, amount: Decimal) {
    sqlx::query("INSERT INTO wallet_balance (user_id, balance, currency) VALUES ($1, $2, 'INR')")
        .bind(*stack.user.as_uuid())
        .bind(amount)
        .execute(stack.db.pool())
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO wallet_transactions (id, user_id, type, amount, currency, description) \
         VALUES (gen_random_uuid(), $1, 'credit', $2, 'INR', 'Top up')",
    )
    .bind(*stack.user.as_uuid())
    .bind(amount)
    .execute(stack.db.pool())
    .await
    .unwrap();
}

async fn insert_financed_plan(stack: &Stack) -> core_kernel::PlanId {
    let plan = PlanFixtures::quarterly();
    stack.db.insert_plan(&plan).await.unwrap();
    stack
        .db
        .insert_financing_option(&domain_financing::FinancingOption::new(plan.id))
        .await
        .unwrap();
    plan.id
}

fn financed(plan_id: core_kernel::PlanId) -> InitiateRecharge {
    InitiateRecharge {
        plan_id,
        financed: true,
        phone_number: None,
        use_wallet: None,
    }
}

// ============================================================================
// Catalog and identity
// ============================================================================

mod catalog_tests {
    use super::*;
    use domain_financing::FinancingOption;
    use domain_recharge::{CatalogPort, IdentityPort, SettingsPort};

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_plan_and_option_round_trip() {
        let stack = stack().await;
        let plan = PlanFixtures::quarterly();
        let option = FinancingOption::new(plan.id).with_installment_count(6);
        stack.db.insert_plan(&plan).await.unwrap();
        stack.db.insert_financing_option(&option).await.unwrap();

        let catalog = PostgresCatalogAdapter::new(stack.db.pool().clone());
        assert_eq!(catalog.get_plan(plan.id).await.unwrap(), plan);

        let options = catalog.financing_options(plan.id).await.unwrap();
        assert_eq!(options, vec![option]);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_missing_plan_is_not_found() {
        let stack = stack().await;
        let catalog = PostgresCatalogAdapter::new(stack.db.pool().clone());

        let err = catalog.get_plan(core_kernel::PlanId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_settings_fall_back_to_defaults() {
        let stack = stack().await;
        sqlx::query("DELETE FROM finance_settings")
            .execute(stack.db.pool())
            .await
            .unwrap();

        let settings = PostgresSettingsAdapter::new(stack.db.pool().clone())
            .finance_settings()
            .await
            .unwrap();
        assert_eq!(settings, domain_financing::FinanceSettings::default());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_unverified_phone_is_hidden() {
        let stack = stack().await;
        let unverified = UserId::new_v7();
        sqlx::query(
            "INSERT INTO profiles (user_id, phone_number, phone_verified) VALUES ($1, '9123456780', FALSE)",
        )
        .bind(*unverified.as_uuid())
        .execute(stack.db.pool())
        .await
        .unwrap();

        let identity = PostgresIdentityAdapter::new(stack.db.pool().clone());
        assert_eq!(
            identity.verified_phone(stack.user).await.unwrap(),
            Some(PhoneFixtures::verified())
        );
        assert_eq!(identity.verified_phone(unverified).await.unwrap(), None);
    }
}

// ============================================================================
// Settlement
// ============================================================================

mod settlement_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_financed_purchase_settles_atomically() {
        let stack = stack().await;
        let plan = PlanFixtures::quarterly();
        stack.db.insert_plan(&plan).await.unwrap();
        stack
            .db
            .insert_financing_option(&domain_financing::FinancingOption::new(plan.id))
            .await
            .unwrap();
        fund_wallet(&stack, dec!(200)).await;

        let started = stack.orchestrator.initiate(stack.user, financed(plan.id)).await.unwrap();
        let txn = started.recharge.transaction_id;
        assert_eq!(started.recharge.wallet_amount_used, Money::inr(dec!(200)));
        assert_eq!(stack.gateway.requested_amount(txn).await, Some(Money::inr(dec!(158))));

        stack.gateway.complete(txn).await.unwrap();
        let outcome = stack.orchestrator.verify(stack.user, txn).await.unwrap();
        let recharge = match outcome {
            VerificationOutcome::Settled(recharge) => recharge,
            other => panic!("expected settlement, got {:?}", other),
        };
        assert_eq!(recharge.status, PaymentStatus::Completed);

        let breakdown = recharge.financing.clone().unwrap().breakdown;
        let installments = stack.store.installments(stack.user).await.unwrap();
        assert_schedule_matches(&installments, &breakdown);

        let wallet = stack.store.wallet(stack.user).await.unwrap();
        assert_eq!(wallet.balance, Money::inr(dec!(50)));
        let ledger = stack.store.wallet_transactions(stack.user).await.unwrap();
        assert_ledger_balanced(&wallet, &ledger);
        assert_single_credit(&ledger, &txn.to_string());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_concurrent_verification_settles_once() {
        let stack = stack().await;
        let plan = PlanFixtures::quarterly();
        stack.db.insert_plan(&plan).await.unwrap();
        stack
            .db
            .insert_financing_option(&domain_financing::FinancingOption::new(plan.id))
            .await
            .unwrap();

        let started = stack.orchestrator.initiate(stack.user, financed(plan.id)).await.unwrap();
        let txn = started.recharge.transaction_id;
        stack.gateway.complete(txn).await.unwrap();

        let (first, second) = tokio::join!(
            stack.orchestrator.verify(stack.user, txn),
            stack.orchestrator.verify(stack.user, txn)
        );
        let settled = [first.unwrap(), second.unwrap()]
            .iter()
            .filter(|o| matches!(o, VerificationOutcome::Settled(_)))
            .count();
        assert_eq!(settled, 1);

        assert_eq!(stack.store.installments(stack.user).await.unwrap().len(), 3);
        let ledger = stack.store.wallet_transactions(stack.user).await.unwrap();
        assert_single_credit(&ledger, &txn.to_string());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_back_to_back_purchases_reserve_separately() {
        let stack = stack().await;
        let plan_id = insert_financed_plan(&stack).await;
        fund_wallet(&stack, dec!(200)).await;

        let first = stack.orchestrator.initiate(stack.user, financed(plan_id)).await.unwrap();
        let second = stack.orchestrator.initiate(stack.user, financed(plan_id)).await.unwrap();
        assert_eq!(first.recharge.wallet_amount_used, Money::inr(dec!(200)));
        assert!(second.recharge.wallet_amount_used.is_zero());

        let wallet = stack.store.wallet(stack.user).await.unwrap();
        assert_eq!(wallet.reserved, Money::inr(dec!(200)));
        assert!(wallet.available().is_zero());

        for txn in [first.recharge.transaction_id, second.recharge.transaction_id] {
            stack.gateway.complete(txn).await.unwrap();
            let outcome = stack.orchestrator.verify(stack.user, txn).await.unwrap();
            assert!(matches!(outcome, VerificationOutcome::Settled(_)));
        }

        let wallet = stack.store.wallet(stack.user).await.unwrap();
        assert_eq!(wallet.balance, Money::inr(dec!(100)));
        assert!(wallet.reserved.is_zero());
        let ledger = stack.store.wallet_transactions(stack.user).await.unwrap();
        assert_ledger_balanced(&wallet, &ledger);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_concurrent_initiations_hold_funds_once() {
        let stack = stack().await;
        let plan_id = insert_financed_plan(&stack).await;
        fund_wallet(&stack, dec!(200)).await;

        let (a, b) = tokio::join!(
            stack.orchestrator.initiate(stack.user, financed(plan_id)),
            stack.orchestrator.initiate(stack.user, financed(plan_id))
        );

        let mut held = Decimal::ZERO;
        for result in [a, b] {
            match result {
                Ok(started) => held += started.recharge.wallet_amount_used.amount(),
                Err(e) => assert!(matches!(e, RechargeError::InsufficientBalance { .. })),
            }
        }
        let wallet = stack.store.wallet(stack.user).await.unwrap();
        assert!(held <= dec!(200));
        assert_eq!(wallet.reserved.amount(), held);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_reserved_funds_cannot_be_removed_directly() {
        let stack = stack().await;
        let plan = PlanFixtures::monthly();
        stack.db.insert_plan(&plan).await.unwrap();
        fund_wallet(&stack, dec!(100)).await;

        stack
            .orchestrator
            .initiate(
                stack.user,
                InitiateRecharge {
                    plan_id: plan.id,
                    financed: false,
                    phone_number: None,
                    use_wallet: Some(true),
                },
            )
            .await
            .unwrap();

        let result = sqlx::query("UPDATE wallet_balance SET balance = 10 WHERE user_id = $1")
            .bind(*stack.user.as_uuid())
            .execute(stack.db.pool())
            .await;
        assert!(result.is_err());
        assert_eq!(
            stack.store.wallet(stack.user).await.unwrap().balance,
            Money::inr(dec!(100))
        );
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_failed_payment_releases_hold() {
        let stack = stack().await;
        let plan = PlanFixtures::monthly();
        stack.db.insert_plan(&plan).await.unwrap();
        fund_wallet(&stack, dec!(100)).await;

        let started = stack
            .orchestrator
            .initiate(
                stack.user,
                InitiateRecharge {
                    plan_id: plan.id,
                    financed: false,
                    phone_number: None,
                    use_wallet: Some(true),
                },
            )
            .await
            .unwrap();
        let txn = started.recharge.transaction_id;
        assert_eq!(stack.store.wallet(stack.user).await.unwrap().reserved, Money::inr(dec!(100)));

        stack.gateway.fail(txn).await.unwrap();
        let outcome = stack.orchestrator.verify(stack.user, txn).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Failed(_)));

        let wallet = stack.store.wallet(stack.user).await.unwrap();
        assert_eq!(wallet.balance, Money::inr(dec!(100)));
        assert!(wallet.reserved.is_zero());
        assert_eq!(stack.store.get_recharge(txn).await.unwrap().status, PaymentStatus::Failed);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_failed_payment_is_recorded() {
        let stack = stack().await;
        let plan = PlanFixtures::monthly();
        stack.db.insert_plan(&plan).await.unwrap();

        let started = stack
            .orchestrator
            .initiate(
                stack.user,
                InitiateRecharge {
                    plan_id: plan.id,
                    financed: false,
                    phone_number: None,
                    use_wallet: None,
                },
            )
            .await
            .unwrap();
        let txn = started.recharge.transaction_id;
        stack.gateway.fail(txn).await.unwrap();

        let outcome = stack.orchestrator.verify(stack.user, txn).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Failed(_)));
        assert!(stack.store.wallet_transactions(stack.user).await.unwrap().is_empty());
    }
}

// ============================================================================
// Installments
// ============================================================================

mod installment_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_second_installment_paid_once() {
        let stack = stack().await;
        let plan = PlanFixtures::quarterly();
        stack.db.insert_plan(&plan).await.unwrap();
        stack
            .db
            .insert_financing_option(&domain_financing::FinancingOption::new(plan.id))
            .await
            .unwrap();

        let started = stack.orchestrator.initiate(stack.user, financed(plan.id)).await.unwrap();
        stack.gateway.complete(started.recharge.transaction_id).await.unwrap();
        stack
            .orchestrator
            .verify(stack.user, started.recharge.transaction_id)
            .await
            .unwrap();

        let installments = stack.store.installments(stack.user).await.unwrap();
        let second = &installments[1];

        let payment = stack
            .orchestrator
            .initiate_installment_payment(stack.user, second.id)
            .await
            .unwrap()
            .payment;
        stack.gateway.complete(payment.transaction_id).await.unwrap();

        let verified = stack
            .orchestrator
            .verify_installment_payment(stack.user, payment.transaction_id)
            .await
            .unwrap();
        match verified {
            InstallmentVerification::Paid(installment) => {
                assert_eq!(installment.sequence, 2);
                assert_eq!(installment.transaction_id, Some(payment.transaction_id));
            }
            other => panic!("expected paid, got {:?}", other),
        }

        let again = stack
            .orchestrator
            .verify_installment_payment(stack.user, payment.transaction_id)
            .await
            .unwrap();
        assert!(matches!(again, InstallmentVerification::AlreadyPaid(_)));

        let err = stack
            .orchestrator
            .initiate_installment_payment(stack.user, second.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RechargeError::InstallmentAlreadyPaid(_)));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_one_open_attempt_per_installment() {
        let stack = stack().await;
        let plan_id = insert_financed_plan(&stack).await;

        let started = stack.orchestrator.initiate(stack.user, financed(plan_id)).await.unwrap();
        stack.gateway.complete(started.recharge.transaction_id).await.unwrap();
        stack
            .orchestrator
            .verify(stack.user, started.recharge.transaction_id)
            .await
            .unwrap();
        let second = stack.store.installments(stack.user).await.unwrap()[1].clone();

        let open = stack
            .orchestrator
            .initiate_installment_payment(stack.user, second.id)
            .await
            .unwrap()
            .payment;
        let err = stack
            .orchestrator
            .initiate_installment_payment(stack.user, second.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RechargeError::InstallmentPaymentInProgress(_)));

        // the partial unique index rejects a second pending row outright
        let duplicate = InstallmentPayment::pending(second.id, stack.user, second.amount);
        let err = stack.store.create_installment_payment(&duplicate).await.unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(
            stack.store.pending_installment_payment(second.id).await.unwrap().map(|p| p.transaction_id),
            Some(open.transaction_id)
        );
    }
}
