//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about. [`TestEnvironmentBuilder`] wires a [`PaymentOrchestrator`]
//! to the in-memory adapters and the sandbox gateway.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{Money, PhoneNumber, PlanId, Rate, UserId};
use domain_financing::{FinanceSettings, FinancingOption};
use domain_recharge::{
    MockCatalogPort, MockIdentityPort, MockRechargeStore, MockSettingsPort, OrchestratorConfig,
    PaymentOrchestrator, Plan, SandboxGateway,
};

use crate::fixtures::{MoneyFixtures, PhoneFixtures};

/// Builder for catalog plans
pub struct PlanBuilder {
    operator: String,
    name: String,
    amount: Money,
    validity_days: u32,
    multi_month: bool,
    active: bool,
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            operator: "Jio".to_string(),
            name: "Test plan".to_string(),
            amount: MoneyFixtures::inr_199(),
            validity_days: 28,
            multi_month: false,
            active: true,
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    pub fn multi_month(mut self) -> Self {
        self.multi_month = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn build(self) -> Plan {
        let mut plan = Plan::new(self.operator, self.name, self.amount, self.validity_days);
        plan.is_multi_month = self.multi_month;
        plan.is_active = self.active;
        plan
    }
}

/// Builder for financing options; unset overrides fall back to settings
pub struct FinancingOptionBuilder {
    option: FinancingOption,
}

impl FinancingOptionBuilder {
    pub fn for_plan(plan_id: PlanId) -> Self {
        Self {
            option: FinancingOption::new(plan_id),
        }
    }

    pub fn installments(mut self, count: u32) -> Self {
        self.option.installment_count = Some(count);
        self
    }

    /// Processing fee as a percentage, e.g. `dec!(2.5)`
    pub fn fee_percent(mut self, percent: Decimal) -> Self {
        self.option.processing_fee_rate = Some(Rate::from_percentage(percent));
        self
    }

    pub fn tax_percent(mut self, percent: Decimal) -> Self {
        self.option.tax_rate = Some(Rate::from_percentage(percent));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.option.is_active = false;
        self
    }

    pub fn build(self) -> FinancingOption {
        self.option
    }
}

/// An orchestrator wired to in-memory adapters, with handles to each
pub struct TestEnvironment {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub identity: Arc<MockIdentityPort>,
    pub catalog: Arc<MockCatalogPort>,
    pub settings: Arc<MockSettingsPort>,
    pub gateway: Arc<SandboxGateway>,
    pub store: Arc<MockRechargeStore>,
    /// A user with a verified phone number
    pub user: UserId,
}

pub struct TestEnvironmentBuilder {
    plans: Vec<Plan>,
    options: Vec<FinancingOption>,
    settings: FinanceSettings,
    wallet: Option<Money>,
    phone: Option<PhoneNumber>,
    config: OrchestratorConfig,
}

impl Default for TestEnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironmentBuilder {
    pub fn new() -> Self {
        Self {
            plans: Vec::new(),
            options: Vec::new(),
            settings: FinanceSettings::default(),
            wallet: None,
            phone: Some(PhoneFixtures::verified()),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    /// Adds the plan together with an active default financing option
    pub fn with_financed_plan(mut self, plan: Plan) -> Self {
        self.options.push(FinancingOption::new(plan.id));
        self.plans.push(plan);
        self
    }

    pub fn with_option(mut self, option: FinancingOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_settings(mut self, settings: FinanceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Funds the user's wallet before the test starts
    pub fn with_wallet_balance(mut self, amount: Money) -> Self {
        self.wallet = Some(amount);
        self
    }

    pub fn without_verified_phone(mut self) -> Self {
        self.phone = None;
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_gateway_timeout(timeout);
        self
    }

    pub async fn build(self) -> TestEnvironment {
        let user = UserId::new_v7();

        let identity = Arc::new(MockIdentityPort::new());
        if let Some(phone) = self.phone {
            identity.set_phone(user, phone).await;
        }

        let catalog = Arc::new(MockCatalogPort::new());
        for plan in self.plans {
            catalog.add_plan(plan).await;
        }
        for option in self.options {
            catalog.add_option(option).await;
        }

        let settings = Arc::new(MockSettingsPort::new(self.settings));
        let gateway = Arc::new(SandboxGateway::new(self.config.redirect_base_url.clone()));
        let store = Arc::new(MockRechargeStore::new());
        if let Some(amount) = self.wallet {
            store.fund_wallet(user, amount).await;
        }

        let orchestrator = Arc::new(PaymentOrchestrator::new(
            identity.clone(),
            catalog.clone(),
            settings.clone(),
            gateway.clone(),
            store.clone(),
            self.config,
        ));

        TestEnvironment {
            orchestrator,
            identity,
            catalog,
            settings,
            gateway,
            store,
            user,
        }
    }
}
