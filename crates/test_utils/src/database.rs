//! Database Test Utilities
//!
//! Provides a PostgreSQL testcontainer with the migrations applied, plus
//! seed helpers for the catalog and identity tables that the adapters only
//! read.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

use core_kernel::{PhoneNumber, UserId};
use domain_financing::{FinanceSettings, FinancingOption};
use domain_recharge::Plan;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Credentials of the postgres module image
const POSTGRES_USER: &str = "postgres";
const POSTGRES_PASSWORD: &str = "postgres";
const POSTGRES_DB: &str = "postgres";

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<Postgres>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container and applies the migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or a migration fails
    pub async fn new() -> TestResult<Self> {
        let container = Postgres::default().start().await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            host,
            port,
            ..TestDatabaseConfig::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        infra_db::run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data from the database while preserving the schema
    pub async fn clear_data(&self) -> TestResult<()> {
        let tables = [
            "wallet_transactions",
            "wallet_balance",
            "emi_payments",
            "emi_transactions",
            "user_recharges",
            "financing_options",
            "finance_settings",
            "recharge_plans",
            "profiles",
        ];

        for table in tables {
            sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", table))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Inserts a profile; `phone` is stored as verified
    pub async fn insert_profile(&self, user_id: UserId, phone: Option<&PhoneNumber>) -> TestResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, phone_number, phone_verified) VALUES ($1, $2, $3)",
        )
        .bind(*user_id.as_uuid())
        .bind(phone.map(|p| p.as_str().to_string()))
        .bind(phone.is_some())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_plan(&self, plan: &Plan) -> TestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recharge_plans
                (plan_id, operator, name, amount, currency, validity_days, is_multi_month, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*plan.id.as_uuid())
        .bind(&plan.operator)
        .bind(&plan.name)
        .bind(plan.amount.amount())
        .bind(plan.amount.currency().code())
        .bind(plan.validity_days as i32)
        .bind(plan.is_multi_month)
        .bind(plan.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_financing_option(&self, option: &FinancingOption) -> TestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO financing_options
                (option_id, plan_id, installment_count, processing_fee, gst_percentage, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*option.id.as_uuid())
        .bind(*option.plan_id.as_uuid())
        .bind(option.installment_count.map(|c| c as i32))
        .bind(option.processing_fee_rate.map(|r| r.as_percentage()))
        .bind(option.tax_rate.map(|r| r.as_percentage()))
        .bind(option.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replaces the single settings row
    pub async fn insert_settings(&self, settings: &FinanceSettings) -> TestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO finance_settings
                (id, cashback_amount, currency, processing_fee, gst_percentage, installment_count, period_multiplier)
            VALUES (1, $1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                cashback_amount = EXCLUDED.cashback_amount,
                currency = EXCLUDED.currency,
                processing_fee = EXCLUDED.processing_fee,
                gst_percentage = EXCLUDED.gst_percentage,
                installment_count = EXCLUDED.installment_count,
                period_multiplier = EXCLUDED.period_multiplier,
                updated_at = now()
            "#,
        )
        .bind(settings.cashback_amount.amount())
        .bind(settings.cashback_amount.currency().code())
        .bind(settings.processing_fee_rate.as_percentage())
        .bind(settings.tax_rate.as_percentage())
        .bind(settings.installment_count as i32)
        .bind(settings.period_multiplier as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Global test database for shared integration tests
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a shared test database instance
///
/// # Panics
///
/// Panics if the database fails to initialize
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates an isolated test database for a single test
pub async fn create_isolated_test_database() -> TestResult<TestDatabase> {
    TestDatabase::new().await
}
