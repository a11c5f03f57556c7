//! Recharge Domain Ports
//!
//! Collaborators the [`PaymentOrchestrator`](crate::PaymentOrchestrator)
//! consumes. Each is injected as an `Arc<dyn ...>`; there is no ambient
//! client.
//!
//! - [`IdentityPort`]: verified phone number for an authenticated user
//! - [`CatalogPort`]: plans and financing options (read-only)
//! - [`SettingsPort`]: cashback and financing defaults
//! - [`PaymentGatewayPort`]: payment intents and final payment state
//! - [`RechargeStore`]: durable recharges, installments and wallets
//!
//! PostgreSQL adapters live in `infra_db`; in-memory adapters for tests are
//! in [`mock`] behind the `mock` feature. The in-process
//! [`SandboxGateway`](crate::SandboxGateway) implements the gateway port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{
    DomainPort, FinancingId, HealthCheckable, InstallmentId, Money, PhoneNumber, PlanId,
    PortError, TransactionId, UserId,
};
use domain_financing::{FinanceSettings, FinancingOption, Installment};
use domain_wallet::{WalletAccount, WalletTransaction};

use crate::error::RechargeError;
use crate::plan::Plan;
use crate::recharge::{InstallmentPayment, Recharge};

// ============================================================================
// External collaborators
// ============================================================================

#[async_trait]
pub trait IdentityPort: DomainPort {
    /// The user's verified phone number, if one is on file
    async fn verified_phone(&self, user_id: UserId) -> Result<Option<PhoneNumber>, PortError>;
}

#[async_trait]
pub trait CatalogPort: DomainPort {
    /// Returns `PortError::NotFound` for unknown plans
    async fn get_plan(&self, plan_id: PlanId) -> Result<Plan, PortError>;

    /// All financing options for the plan, active or not
    async fn financing_options(&self, plan_id: PlanId) -> Result<Vec<FinancingOption>, PortError>;
}

#[async_trait]
pub trait SettingsPort: DomainPort {
    async fn finance_settings(&self) -> Result<FinanceSettings, PortError>;
}

/// Final or in-progress state reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayPaymentState {
    Completed,
    Failed,
    Pending,
}

impl fmt::Display for GatewayPaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GatewayPaymentState::Completed => "COMPLETED",
            GatewayPaymentState::Failed => "FAILED",
            GatewayPaymentState::Pending => "PENDING",
        };
        f.write_str(s)
    }
}

/// A request to collect money through the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub amount: Money,
    pub description: String,
    pub phone_number: Option<PhoneNumber>,
    /// Where the gateway sends the user after checkout
    pub return_url: String,
}

#[async_trait]
pub trait PaymentGatewayPort: DomainPort + HealthCheckable {
    /// Registers the payment and returns the URL the user is redirected to
    async fn create_payment_intent(&self, intent: &PaymentIntent) -> Result<String, PortError>;

    async fn payment_state(&self, transaction_id: TransactionId) -> Result<GatewayPaymentState, PortError>;
}

// ============================================================================
// Persistence
// ============================================================================

/// Everything applied when a purchase's payment is confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub settled_at: DateTime<Utc>,
    /// Reserved wallet amount to debit, if any
    pub wallet_debit: Option<Money>,
    /// Present for financed purchases
    pub schedule: Option<ScheduleInsert>,
    /// Cashback credit keyed by the transaction id
    pub cashback: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleInsert {
    pub financing_id: FinancingId,
    pub installments: Vec<Installment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call moved the recharge to `completed`
    Applied { recharge: Recharge, wallet: WalletAccount },
    /// Another call already settled it; nothing was changed
    AlreadySettled { recharge: Recharge },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallmentSettlementOutcome {
    Paid { installment: Installment },
    AlreadySettled { installment: Installment },
    /// Another attempt had already paid the installment; this attempt was
    /// moved to `refund_due`
    RefundDue {
        payment: InstallmentPayment,
        installment: Installment,
    },
}

/// Durable storage for recharges, installments and wallets
///
/// `create_recharge`, `settle`, `mark_failed` and
/// `settle_installment_payment` are atomic: either every effect is stored
/// or none is. Wallet balance changes for one user are serialised by the
/// implementation.
#[async_trait]
pub trait RechargeStore: DomainPort + HealthCheckable {
    /// Stores a pending recharge and holds its `wallet_amount_used`
    ///
    /// The hold is placed under the wallet lock in the same unit as the
    /// insert, so two purchases never reserve the same funds.
    ///
    /// # Errors
    ///
    /// - `RechargeError::InsufficientBalance` if the available balance no
    ///   longer covers `wallet_amount_used`; nothing is stored
    async fn create_recharge(&self, recharge: &Recharge) -> Result<(), RechargeError>;

    /// Returns `PortError::NotFound` for unknown transaction ids
    async fn get_recharge(&self, transaction_id: TransactionId) -> Result<Recharge, PortError>;

    /// Compare-and-set `pending -> completed` plus every dependent effect
    ///
    /// `wallet_debit` is spent from the hold placed by `create_recharge`.
    ///
    /// # Errors
    ///
    /// - `RechargeError::SettlementConflict` if the recharge already failed
    /// - `RechargeError::DuplicateSchedule` if installments already exist
    async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, RechargeError>;

    /// Compare-and-set `pending -> failed`, releasing the wallet hold;
    /// returns the stored recharge
    async fn mark_failed(&self, transaction_id: TransactionId) -> Result<Recharge, RechargeError>;

    /// The user's wallet, opened with a zero balance if it does not exist
    async fn wallet(&self, user_id: UserId) -> Result<WalletAccount, PortError>;

    /// Newest first
    async fn wallet_transactions(&self, user_id: UserId) -> Result<Vec<WalletTransaction>, PortError>;

    /// Ordered by due date
    async fn installments(&self, user_id: UserId) -> Result<Vec<Installment>, PortError>;

    async fn get_installment(&self, installment_id: InstallmentId) -> Result<Installment, PortError>;

    /// Returns `PortError::Conflict` while the installment has another
    /// pending attempt
    async fn create_installment_payment(&self, payment: &InstallmentPayment) -> Result<(), PortError>;

    async fn get_installment_payment(&self, transaction_id: TransactionId) -> Result<InstallmentPayment, PortError>;

    /// The installment's open (`pending`) attempt, if any
    async fn pending_installment_payment(
        &self,
        installment_id: InstallmentId,
    ) -> Result<Option<InstallmentPayment>, PortError>;

    /// Marks the attempt completed and the installment paid, once
    ///
    /// An attempt confirmed after its installment was already paid moves to
    /// `refund_due` instead.
    async fn settle_installment_payment(
        &self,
        transaction_id: TransactionId,
        paid_at: DateTime<Utc>,
    ) -> Result<InstallmentSettlementOutcome, RechargeError>;

    async fn mark_installment_payment_failed(
        &self,
        transaction_id: TransactionId,
    ) -> Result<InstallmentPayment, RechargeError>;
}

/// In-memory adapters for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{Mutex, RwLock};

    use core_kernel::{Currency, HealthCheckResult};
    use domain_financing::ensure_schedule_absent;
    use domain_wallet::{
        apply_credit, apply_deduction, credit_once, release, reserve, spend_reserved, CreditOutcome,
    };

    use crate::recharge::PaymentStatus;

    /// Description on wallet debits made at settlement
    const WALLET_DEBIT_DESCRIPTION: &str = "Used for recharge";
    const CASHBACK_DESCRIPTION: &str = "Cashback for financed recharge";

    #[derive(Debug, Default)]
    pub struct MockIdentityPort {
        phones: RwLock<HashMap<UserId, PhoneNumber>>,
    }

    impl MockIdentityPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_phone(user_id: UserId, phone: PhoneNumber) -> Self {
            let port = Self::new();
            port.set_phone(user_id, phone).await;
            port
        }

        pub async fn set_phone(&self, user_id: UserId, phone: PhoneNumber) {
            self.phones.write().await.insert(user_id, phone);
        }
    }

    impl DomainPort for MockIdentityPort {}

    #[async_trait]
    impl IdentityPort for MockIdentityPort {
        async fn verified_phone(&self, user_id: UserId) -> Result<Option<PhoneNumber>, PortError> {
            Ok(self.phones.read().await.get(&user_id).cloned())
        }
    }

    #[derive(Debug, Default)]
    pub struct MockCatalogPort {
        plans: RwLock<HashMap<PlanId, Plan>>,
        options: RwLock<Vec<FinancingOption>>,
    }

    impl MockCatalogPort {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_plan(&self, plan: Plan) {
            self.plans.write().await.insert(plan.id, plan);
        }

        pub async fn add_option(&self, option: FinancingOption) {
            self.options.write().await.push(option);
        }
    }

    impl DomainPort for MockCatalogPort {}

    #[async_trait]
    impl CatalogPort for MockCatalogPort {
        async fn get_plan(&self, plan_id: PlanId) -> Result<Plan, PortError> {
            self.plans
                .read()
                .await
                .get(&plan_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Plan", plan_id))
        }

        async fn financing_options(&self, plan_id: PlanId) -> Result<Vec<FinancingOption>, PortError> {
            Ok(self
                .options
                .read()
                .await
                .iter()
                .filter(|o| o.plan_id == plan_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Debug, Default)]
    pub struct MockSettingsPort {
        settings: RwLock<FinanceSettings>,
    }

    impl MockSettingsPort {
        pub fn new(settings: FinanceSettings) -> Self {
            Self {
                settings: RwLock::new(settings),
            }
        }

        pub async fn set(&self, settings: FinanceSettings) {
            *self.settings.write().await = settings;
        }
    }

    impl DomainPort for MockSettingsPort {}

    #[async_trait]
    impl SettingsPort for MockSettingsPort {
        async fn finance_settings(&self) -> Result<FinanceSettings, PortError> {
            Ok(self.settings.read().await.clone())
        }
    }

    #[derive(Debug, Default)]
    struct StoreState {
        recharges: HashMap<TransactionId, Recharge>,
        wallets: HashMap<UserId, WalletAccount>,
        ledger: Vec<WalletTransaction>,
        installments: Vec<Installment>,
        installment_payments: HashMap<TransactionId, InstallmentPayment>,
    }

    impl StoreState {
        fn wallet_or_open(&self, user_id: UserId) -> WalletAccount {
            self.wallets
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| WalletAccount::open(user_id, Currency::INR))
        }
    }

    /// In-memory [`RechargeStore`]
    ///
    /// One mutex guards all state, which gives `settle` the same
    /// all-or-nothing behaviour as a database transaction.
    #[derive(Debug, Default, Clone)]
    pub struct MockRechargeStore {
        state: Arc<Mutex<StoreState>>,
    }

    impl MockRechargeStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds a wallet balance through a credit entry
        pub async fn fund_wallet(&self, user_id: UserId, amount: Money) {
            let mut state = self.state.lock().await;
            let wallet = state.wallet_or_open(user_id);
            if let Ok((wallet, entry)) = apply_credit(&wallet, amount, "Top up", None) {
                state.wallets.insert(user_id, wallet);
                state.ledger.push(entry);
            }
        }

        pub async fn set_use_for_recharge(&self, user_id: UserId, enabled: bool) {
            let mut state = self.state.lock().await;
            let mut wallet = state.wallet_or_open(user_id);
            wallet.use_for_recharge = enabled;
            state.wallets.insert(user_id, wallet);
        }

        /// Debits the wallet outside any settlement, e.g. a concurrent spend
        pub async fn drain_wallet(&self, user_id: UserId, amount: Money) -> Result<(), RechargeError> {
            let mut state = self.state.lock().await;
            let wallet = state.wallet_or_open(user_id);
            let (wallet, entry) = apply_deduction(&wallet, amount, "Spent elsewhere", None)?;
            state.wallets.insert(user_id, wallet);
            state.ledger.push(entry);
            Ok(())
        }

        pub async fn ledger_len(&self) -> usize {
            self.state.lock().await.ledger.len()
        }

        /// Every recharge the user started, in no particular order
        pub async fn recharges_for(&self, user_id: UserId) -> Vec<Recharge> {
            self.state
                .lock()
                .await
                .recharges
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect()
        }
    }

    impl DomainPort for MockRechargeStore {}

    #[async_trait]
    impl HealthCheckable for MockRechargeStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-recharge-store", 0)
        }
    }

    #[async_trait]
    impl RechargeStore for MockRechargeStore {
        async fn create_recharge(&self, recharge: &Recharge) -> Result<(), RechargeError> {
            let mut state = self.state.lock().await;
            if state.recharges.contains_key(&recharge.transaction_id) {
                return Err(PortError::conflict(format!(
                    "recharge {} already exists",
                    recharge.transaction_id
                ))
                .into());
            }
            if recharge.wallet_amount_used.is_positive() {
                let wallet = reserve(&state.wallet_or_open(recharge.user_id), recharge.wallet_amount_used)?;
                state.wallets.insert(recharge.user_id, wallet);
            }
            state.recharges.insert(recharge.transaction_id, recharge.clone());
            Ok(())
        }

        async fn get_recharge(&self, transaction_id: TransactionId) -> Result<Recharge, PortError> {
            self.state
                .lock()
                .await
                .recharges
                .get(&transaction_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Recharge", transaction_id))
        }

        async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, RechargeError> {
            let mut state = self.state.lock().await;
            let mut recharge = state
                .recharges
                .get(&settlement.transaction_id)
                .cloned()
                .ok_or_else(|| RechargeError::not_found("Recharge", settlement.transaction_id))?;

            match recharge.status {
                PaymentStatus::Completed => return Ok(SettlementOutcome::AlreadySettled { recharge }),
                PaymentStatus::Failed | PaymentStatus::RefundDue => {
                    return Err(RechargeError::SettlementConflict(format!(
                        "recharge {} already {}",
                        settlement.transaction_id, recharge.status
                    )))
                }
                PaymentStatus::Pending => {}
            }
            recharge.complete(settlement.settled_at)?;

            // Stage every change, then commit together
            let mut wallet = state.wallet_or_open(settlement.user_id);
            let mut new_entries = Vec::new();
            let reference = settlement.transaction_id.to_string();

            if let Some(debit) = settlement.wallet_debit.filter(Money::is_positive) {
                let (after, entry) =
                    spend_reserved(&wallet, debit, WALLET_DEBIT_DESCRIPTION, Some(&reference))?;
                wallet = after;
                new_entries.push(entry);
            }

            if let Some(schedule) = &settlement.schedule {
                ensure_schedule_absent(schedule.financing_id, &state.installments)?;
            }

            if let Some(cashback) = settlement.cashback {
                if let CreditOutcome::Applied { account, entry } =
                    credit_once(&wallet, &state.ledger, cashback, CASHBACK_DESCRIPTION, &reference)?
                {
                    wallet = account;
                    new_entries.push(entry);
                }
            }

            state.wallets.insert(settlement.user_id, wallet.clone());
            state.ledger.extend(new_entries);
            if let Some(schedule) = settlement.schedule {
                state.installments.extend(schedule.installments);
            }
            state.recharges.insert(settlement.transaction_id, recharge.clone());

            Ok(SettlementOutcome::Applied { recharge, wallet })
        }

        async fn mark_failed(&self, transaction_id: TransactionId) -> Result<Recharge, RechargeError> {
            let mut state = self.state.lock().await;
            let mut recharge = state
                .recharges
                .get(&transaction_id)
                .cloned()
                .ok_or_else(|| RechargeError::not_found("Recharge", transaction_id))?;
            if recharge.status != PaymentStatus::Pending {
                return Ok(recharge);
            }
            recharge.fail()?;

            if recharge.wallet_amount_used.is_positive() {
                let wallet = release(&state.wallet_or_open(recharge.user_id), recharge.wallet_amount_used)?;
                state.wallets.insert(recharge.user_id, wallet);
            }
            state.recharges.insert(transaction_id, recharge.clone());
            Ok(recharge)
        }

        async fn wallet(&self, user_id: UserId) -> Result<WalletAccount, PortError> {
            let mut state = self.state.lock().await;
            let wallet = state.wallet_or_open(user_id);
            state.wallets.insert(user_id, wallet.clone());
            Ok(wallet)
        }

        async fn wallet_transactions(&self, user_id: UserId) -> Result<Vec<WalletTransaction>, PortError> {
            let state = self.state.lock().await;
            let mut entries: Vec<_> = state
                .ledger
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect();
            entries.reverse();
            Ok(entries)
        }

        async fn installments(&self, user_id: UserId) -> Result<Vec<Installment>, PortError> {
            let state = self.state.lock().await;
            let mut rows: Vec<_> = state
                .installments
                .iter()
                .filter(|i| i.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by_key(|i| (i.due_date, i.sequence));
            Ok(rows)
        }

        async fn get_installment(&self, installment_id: InstallmentId) -> Result<Installment, PortError> {
            self.state
                .lock()
                .await
                .installments
                .iter()
                .find(|i| i.id == installment_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Installment", installment_id))
        }

        async fn create_installment_payment(&self, payment: &InstallmentPayment) -> Result<(), PortError> {
            let mut state = self.state.lock().await;
            if state.installment_payments.contains_key(&payment.transaction_id) {
                return Err(PortError::conflict(format!(
                    "installment payment {} already exists",
                    payment.transaction_id
                )));
            }
            let open = state.installment_payments.values().any(|p| {
                p.installment_id == payment.installment_id && p.status == PaymentStatus::Pending
            });
            if open {
                return Err(PortError::conflict(format!(
                    "installment {} already has a pending payment",
                    payment.installment_id
                )));
            }
            state.installment_payments.insert(payment.transaction_id, payment.clone());
            Ok(())
        }

        async fn get_installment_payment(&self, transaction_id: TransactionId) -> Result<InstallmentPayment, PortError> {
            self.state
                .lock()
                .await
                .installment_payments
                .get(&transaction_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("InstallmentPayment", transaction_id))
        }

        async fn pending_installment_payment(
            &self,
            installment_id: InstallmentId,
        ) -> Result<Option<InstallmentPayment>, PortError> {
            Ok(self
                .state
                .lock()
                .await
                .installment_payments
                .values()
                .find(|p| p.installment_id == installment_id && p.status == PaymentStatus::Pending)
                .cloned())
        }

        async fn settle_installment_payment(
            &self,
            transaction_id: TransactionId,
            paid_at: DateTime<Utc>,
        ) -> Result<InstallmentSettlementOutcome, RechargeError> {
            let mut state = self.state.lock().await;
            let mut payment = state
                .installment_payments
                .get(&transaction_id)
                .cloned()
                .ok_or_else(|| RechargeError::not_found("InstallmentPayment", transaction_id))?;
            let index = state
                .installments
                .iter()
                .position(|i| i.id == payment.installment_id)
                .ok_or_else(|| RechargeError::not_found("Installment", payment.installment_id))?;

            match payment.status {
                PaymentStatus::Completed => {
                    return Ok(InstallmentSettlementOutcome::AlreadySettled {
                        installment: state.installments[index].clone(),
                    })
                }
                PaymentStatus::Failed | PaymentStatus::RefundDue => {
                    return Err(RechargeError::SettlementConflict(format!(
                        "installment payment {} already {}",
                        transaction_id, payment.status
                    )))
                }
                PaymentStatus::Pending => {}
            }

            let mut installment = state.installments[index].clone();
            if installment.is_paid() {
                payment.status = PaymentStatus::RefundDue;
                state.installment_payments.insert(transaction_id, payment.clone());
                return Ok(InstallmentSettlementOutcome::RefundDue { payment, installment });
            }
            installment.mark_paid(transaction_id, paid_at)?;

            state.installments[index] = installment.clone();
            payment.status = PaymentStatus::Completed;
            state.installment_payments.insert(transaction_id, payment);
            Ok(InstallmentSettlementOutcome::Paid { installment })
        }

        async fn mark_installment_payment_failed(
            &self,
            transaction_id: TransactionId,
        ) -> Result<InstallmentPayment, RechargeError> {
            let mut state = self.state.lock().await;
            let payment = state
                .installment_payments
                .get_mut(&transaction_id)
                .ok_or_else(|| RechargeError::not_found("InstallmentPayment", transaction_id))?;
            if payment.status == PaymentStatus::Pending {
                payment.status = PaymentStatus::Failed;
            }
            Ok(payment.clone())
        }
    }
}
