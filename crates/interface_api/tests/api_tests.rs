//! HTTP API tests
//!
//! Each test serves the router over an orchestrator wired to the in-memory
//! adapters and the sandbox gateway.

use axum::http::StatusCode;
use axum_test::TestServer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::UserId;
use domain_recharge::Plan;
use interface_api::{auth::create_token, config::ApiConfig, create_router, AppState};
use test_utils::{MoneyFixtures, PlanFixtures, TestEnvironment, TestEnvironmentBuilder};

const SECRET: &str = "api-test-secret";

struct Api {
    server: TestServer,
    env: TestEnvironment,
    token: String,
}

impl Api {
    async fn start(builder: TestEnvironmentBuilder) -> Self {
        let env = builder.build().await;
        let config = ApiConfig {
            jwt_secret: SECRET.to_string(),
            ..ApiConfig::default()
        };
        let state = AppState::new(env.orchestrator.clone(), config).with_sandbox(env.gateway.clone());
        let server = TestServer::new(create_router(state)).unwrap();
        let token = create_token(env.user, SECRET, 300).unwrap();
        Self { server, env, token }
    }

    fn token_for(&self, user: UserId) -> String {
        create_token(user, SECRET, 300).unwrap()
    }

    /// Starts a purchase and returns the response body
    async fn buy(&self, plan: &Plan, financed: bool) -> Value {
        let response = self
            .server
            .post("/api/v1/recharges")
            .authorization_bearer(&self.token)
            .json(&json!({ "plan_id": plan.id.as_uuid(), "financed": financed }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()
    }

    async fn resolve(&self, transaction_id: &str, outcome: &str) -> StatusCode {
        self.server
            .post(&format!("/sandbox/gateway/{}", transaction_id))
            .json(&json!({ "outcome": outcome }))
            .await
            .status_code()
    }

    async fn verify(&self, transaction_id: &str) -> (StatusCode, Value) {
        let response = self
            .server
            .post(&format!("/api/v1/recharges/{}/verify", transaction_id))
            .authorization_bearer(&self.token)
            .await;
        (response.status_code(), response.json::<Value>())
    }
}

fn amount(money: &Value) -> Decimal {
    money["amount"]
        .as_str()
        .map(|s| s.parse().unwrap())
        .unwrap_or_else(|| panic!("not a money value: {}", money))
}

fn transaction_id(body: &Value) -> String {
    body["recharge"]["transaction_id"].as_str().unwrap().to_string()
}

fn financed_env() -> (TestEnvironmentBuilder, Plan) {
    let plan = PlanFixtures::quarterly();
    let builder = TestEnvironmentBuilder::new().with_financed_plan(plan.clone());
    (builder, plan)
}

// ============================================================================
// Health and authentication
// ============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let api = Api::start(TestEnvironmentBuilder::new()).await;

        let response = api.server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let api = Api::start(TestEnvironmentBuilder::new()).await;

        let response = api.server.get("/health").await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_ready_checks_store() {
        let api = Api::start(TestEnvironmentBuilder::new()).await;

        let response = api.server.get("/health/ready").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["status"], "ready");
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let api = Api::start(TestEnvironmentBuilder::new()).await;

        let response = api.server.get("/api/v1/wallet").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let api = Api::start(TestEnvironmentBuilder::new()).await;
        let forged = create_token(api.env.user, "someone-else", 300).unwrap();

        let response = api
            .server
            .get("/api/v1/wallet")
            .authorization_bearer(&forged)
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}

// ============================================================================
// Quotes and purchases
// ============================================================================

mod recharge_tests {
    use super::*;

    #[tokio::test]
    async fn test_financed_quote() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder.with_wallet_balance(MoneyFixtures::inr_200())).await;

        let response = api
            .server
            .get(&format!("/api/v1/plans/{}/quote?financed=true", plan.id.as_uuid()))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body = response.json::<Value>();
        assert_eq!(amount(&body["amount_due"]), dec!(358));
        assert_eq!(amount(&body["wallet_applied"]), dec!(200));
        assert_eq!(amount(&body["payable"]), dec!(158));
        assert_eq!(amount(&body["cashback"]), dec!(50));
        assert_eq!(body["financing"]["installment_count"], 3);
    }

    #[tokio::test]
    async fn test_financed_purchase_end_to_end() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder.with_wallet_balance(MoneyFixtures::inr_200())).await;

        let started = api.buy(&plan, true).await;
        assert_eq!(started["recharge"]["status"], "pending");
        assert!(started["redirect_url"].as_str().unwrap().contains("/sandbox/checkout/"));
        let txn = transaction_id(&started);

        assert_eq!(api.resolve(&txn, "completed").await, StatusCode::NO_CONTENT);

        let (status, verified) = api.verify(&txn).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["outcome"], "settled");
        assert_eq!(verified["recharge"]["status"], "completed");

        let (_, again) = api.verify(&txn).await;
        assert_eq!(again["outcome"], "already_settled");

        let wallet = api
            .server
            .get("/api/v1/wallet")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        assert_eq!(amount(&wallet["balance"]), dec!(50));
        assert_eq!(wallet["transactions"][0]["type"], "credit");

        let installments = api
            .server
            .get("/api/v1/installments")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let installments = installments.as_array().unwrap();
        assert_eq!(installments.len(), 3);
        assert_eq!(installments[0]["status"], "paid");
        assert_eq!(installments[0]["standing"], "paid");
        assert_eq!(installments[1]["status"], "pending");
    }

    #[tokio::test]
    async fn test_wallet_only_purchase_completes_immediately() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(
            TestEnvironmentBuilder::new()
                .with_plan(plan.clone())
                .with_wallet_balance(MoneyFixtures::inr_349()),
        )
        .await;

        let started = api.buy(&plan, false).await;
        assert_eq!(started["recharge"]["status"], "completed");
        assert!(started["redirect_url"].is_null());
    }

    #[tokio::test]
    async fn test_pending_purchase_holds_wallet_funds() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder.with_wallet_balance(MoneyFixtures::inr_200())).await;

        let first = api.buy(&plan, true).await;
        assert_eq!(amount(&first["recharge"]["wallet_amount_used"]), dec!(200));

        let wallet = api
            .server
            .get("/api/v1/wallet")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        assert_eq!(amount(&wallet["balance"]), dec!(200));
        assert_eq!(amount(&wallet["reserved"]), dec!(200));
        assert_eq!(amount(&wallet["available"]), dec!(0));

        let second = api.buy(&plan, true).await;
        assert_eq!(amount(&second["recharge"]["wallet_amount_used"]), dec!(0));
        assert_eq!(amount(&second["recharge"]["total_amount"]), dec!(358));
    }

    #[tokio::test]
    async fn test_verify_while_pending_is_accepted() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder).await;
        let txn = transaction_id(&api.buy(&plan, true).await);

        let (status, body) = api.verify(&txn).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["error"], "pending");
    }

    #[tokio::test]
    async fn test_failed_payment() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;
        let txn = transaction_id(&api.buy(&plan, false).await);

        assert_eq!(api.resolve(&txn, "failed").await, StatusCode::NO_CONTENT);
        let (status, body) = api.verify(&txn).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "failed");
    }

    #[tokio::test]
    async fn test_other_users_recharge_is_not_found() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;
        let txn = transaction_id(&api.buy(&plan, false).await);

        let response = api
            .server
            .get(&format!("/api/v1/recharges/{}", txn))
            .authorization_bearer(&api.token_for(UserId::new()))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let own = api
            .server
            .get(&format!("/api/v1/recharges/{}", txn))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(own.status_code(), StatusCode::OK);
    }
}

// ============================================================================
// Error mapping
// ============================================================================

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_short_phone_fails_validation() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;

        let response = api
            .server
            .post("/api/v1/recharges")
            .authorization_bearer(&api.token)
            .json(&json!({ "plan_id": plan.id.as_uuid(), "phone_number": "12345" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.json::<Value>();
        assert_eq!(body["error"], "validation_error");
        assert!(body["details"][0].as_str().unwrap().starts_with("phone_number"));
    }

    #[tokio::test]
    async fn test_malformed_phone_is_invalid_parameter() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;

        let response = api
            .server
            .post("/api/v1/recharges")
            .authorization_bearer(&api.token)
            .json(&json!({ "plan_id": plan.id.as_uuid(), "phone_number": "98765abcde" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_phone_is_precondition_failure() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(
            TestEnvironmentBuilder::new()
                .with_plan(plan.clone())
                .without_verified_phone(),
        )
        .await;

        let response = api
            .server
            .post("/api/v1/recharges")
            .authorization_bearer(&api.token)
            .json(&json!({ "plan_id": plan.id.as_uuid() }))
            .await;
        assert_eq!(response.status_code(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn test_financing_monthly_plan_is_precondition_failure() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;

        let response = api
            .server
            .get(&format!("/api/v1/plans/{}/quote?financed=true", plan.id.as_uuid()))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(response.status_code(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn test_gateway_outage_is_service_unavailable() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;
        api.env.gateway.set_available(false);

        let response = api
            .server
            .post("/api/v1/recharges")
            .authorization_bearer(&api.token)
            .json(&json!({ "plan_id": plan.id.as_uuid() }))
            .await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_sandbox_rejects_unknown_and_resolved_payments() {
        let plan = PlanFixtures::monthly();
        let api = Api::start(TestEnvironmentBuilder::new().with_plan(plan.clone())).await;

        let unknown = uuid::Uuid::new_v4().to_string();
        assert_eq!(api.resolve(&unknown, "completed").await, StatusCode::NOT_FOUND);

        let txn = transaction_id(&api.buy(&plan, false).await);
        assert_eq!(api.resolve(&txn, "completed").await, StatusCode::NO_CONTENT);
        assert_eq!(api.resolve(&txn, "failed").await, StatusCode::CONFLICT);
    }
}

// ============================================================================
// Installments
// ============================================================================

mod installment_tests {
    use super::*;

    #[tokio::test]
    async fn test_pay_second_installment() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder).await;
        let txn = transaction_id(&api.buy(&plan, true).await);
        api.resolve(&txn, "completed").await;
        api.verify(&txn).await;

        let installments = api
            .server
            .get("/api/v1/installments")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let first = installments[0]["id"].as_str().unwrap().to_string();
        let second = installments[1]["id"].as_str().unwrap().to_string();

        let paid_again = api
            .server
            .post(&format!("/api/v1/installments/{}/pay", first))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(paid_again.status_code(), StatusCode::CONFLICT);

        let started = api
            .server
            .post(&format!("/api/v1/installments/{}/pay", second))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(started.status_code(), StatusCode::CREATED);
        let started = started.json::<Value>();
        assert_eq!(amount(&started["amount"]), dec!(358));
        let payment_txn = started["transaction_id"].as_str().unwrap().to_string();

        api.resolve(&payment_txn, "completed").await;
        let verified = api
            .server
            .post(&format!("/api/v1/installments/payments/{}/verify", payment_txn))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(verified.status_code(), StatusCode::OK);
        let verified = verified.json::<Value>();
        assert_eq!(verified["outcome"], "paid");
        assert_eq!(verified["installment"]["sequence"], 2);
    }

    #[tokio::test]
    async fn test_second_attempt_conflicts_while_first_open() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder).await;
        let txn = transaction_id(&api.buy(&plan, true).await);
        api.resolve(&txn, "completed").await;
        api.verify(&txn).await;

        let installments = api
            .server
            .get("/api/v1/installments")
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        let second = installments[1]["id"].as_str().unwrap().to_string();
        let pay = format!("/api/v1/installments/{}/pay", second);

        let started = api.server.post(&pay).authorization_bearer(&api.token).await;
        assert_eq!(started.status_code(), StatusCode::CREATED);
        let payment_txn = started.json::<Value>()["transaction_id"].as_str().unwrap().to_string();

        let again = api.server.post(&pay).authorization_bearer(&api.token).await;
        assert_eq!(again.status_code(), StatusCode::CONFLICT);

        let payment = api
            .server
            .get(&format!("/api/v1/installments/payments/{}", payment_txn))
            .authorization_bearer(&api.token)
            .await;
        assert_eq!(payment.status_code(), StatusCode::OK);
        assert_eq!(payment.json::<Value>()["status"], "pending");

        // once the open attempt fails a new one may start
        api.resolve(&payment_txn, "failed").await;
        let retry = api.server.post(&pay).authorization_bearer(&api.token).await;
        assert_eq!(retry.status_code(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_standing_as_of_date() {
        let (builder, plan) = financed_env();
        let api = Api::start(builder).await;
        let txn = transaction_id(&api.buy(&plan, true).await);
        api.resolve(&txn, "completed").await;
        api.verify(&txn).await;

        let far_future = chrono::Utc::now().date_naive() + chrono::Duration::days(90);
        let installments = api
            .server
            .get(&format!("/api/v1/installments?as_of={}", far_future))
            .authorization_bearer(&api.token)
            .await
            .json::<Value>();
        assert_eq!(installments[1]["standing"], "overdue");
        assert_eq!(installments[2]["standing"], "overdue");
    }
}
