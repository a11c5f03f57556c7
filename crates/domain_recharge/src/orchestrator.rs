//! Payment orchestration
//!
//! [`PaymentOrchestrator`] drives a purchase through its lifecycle:
//!
//! ```text
//! Initiated ──► GatewayPending ──► Verified ──► Settled
//!     │              │                 └──────► Failed
//!     └──(wallet covers all)──────────────────► Settled
//! ```
//!
//! Preconditions are checked before anything is written. The recharge is
//! stored `pending` before the gateway is contacted, so a gateway outage
//! leaves a queryable record instead of a lost one. Storing it also places
//! a hold on the wallet share, so later purchases only see the remaining
//! balance. Nothing irreversible happens before settlement: the hold is
//! only spent, the schedule only written and cashback only credited inside
//! [`RechargeStore::settle`], which applies them as one unit exactly once.
//! A failed payment releases the hold.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{
    FinancingId, InstallmentId, Money, PhoneNumber, PlanId, PortError, TransactionId, UserId,
};
use domain_financing::{
    calculate_breakdown, cashback_for, generate_schedule, select_financing_option,
    FinanceSettings, FinancingBreakdown, FinancingParams, Installment, InstallmentStanding,
};
use domain_wallet::{compute_deduction, WalletAccount, WalletTransaction};

use crate::config::OrchestratorConfig;
use crate::error::RechargeError;
use crate::plan::Plan;
use crate::ports::{
    CatalogPort, GatewayPaymentState, IdentityPort, InstallmentSettlementOutcome,
    PaymentGatewayPort, PaymentIntent, RechargeStore, ScheduleInsert, Settlement,
    SettlementOutcome, SettingsPort,
};
use crate::recharge::{FinancingTerms, InstallmentPayment, PaymentStatus, Recharge};

/// Request to start a purchase
#[derive(Debug, Clone)]
pub struct InitiateRecharge {
    pub plan_id: PlanId,
    pub financed: bool,
    /// Number to recharge; defaults to the user's verified number
    pub phone_number: Option<String>,
    /// Defaults to the wallet's `use_for_recharge` flag
    pub use_wallet: Option<bool>,
}

/// Side-effect-free price preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub plan: Plan,
    pub financing: Option<FinancingBreakdown>,
    pub amount_due: Money,
    pub wallet_applied: Money,
    pub payable: Money,
    pub cashback: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedRecharge {
    pub recharge: Recharge,
    /// Absent when the wallet covered the whole amount and the recharge settled
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// This call settled the recharge
    Settled(Recharge),
    AlreadySettled(Recharge),
    Failed(Recharge),
}

impl VerificationOutcome {
    pub fn recharge(&self) -> &Recharge {
        match self {
            VerificationOutcome::Settled(r)
            | VerificationOutcome::AlreadySettled(r)
            | VerificationOutcome::Failed(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentPaymentStarted {
    pub payment: InstallmentPayment,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallmentVerification {
    Paid(Installment),
    AlreadyPaid(Installment),
    Failed(InstallmentPayment),
    /// Collected after another attempt had paid the installment
    RefundDue(InstallmentPayment),
}

/// An installment with its standing on a given date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentView {
    pub installment: Installment,
    pub standing: InstallmentStanding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub account: WalletAccount,
    pub transactions: Vec<WalletTransaction>,
}

pub struct PaymentOrchestrator {
    identity: Arc<dyn IdentityPort>,
    catalog: Arc<dyn CatalogPort>,
    settings: Arc<dyn SettingsPort>,
    gateway: Arc<dyn PaymentGatewayPort>,
    store: Arc<dyn RechargeStore>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityPort>,
        catalog: Arc<dyn CatalogPort>,
        settings: Arc<dyn SettingsPort>,
        gateway: Arc<dyn PaymentGatewayPort>,
        store: Arc<dyn RechargeStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            identity,
            catalog,
            settings,
            gateway,
            store,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The store, for health checks
    pub fn store(&self) -> &Arc<dyn RechargeStore> {
        &self.store
    }

    // ========================================================================
    // Purchases
    // ========================================================================

    /// Prices a purchase without writing anything
    #[instrument(skip(self), fields(user_id = %user_id, plan_id = %plan_id))]
    pub async fn quote(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        financed: bool,
        use_wallet: Option<bool>,
    ) -> Result<Quote, RechargeError> {
        let plan = self.available_plan(plan_id).await?;
        let settings = self.settings.finance_settings().await?;
        let (amount_due, financing) = self.price(&plan, financed, &settings).await?;
        let wallet = self.store.wallet(user_id).await?;
        let wallet_applied = wallet_share(&wallet, amount_due, use_wallet)?;

        Ok(Quote {
            payable: amount_due - wallet_applied,
            cashback: cashback_for(financing.is_some(), &settings),
            financing: financing.map(|terms| terms.breakdown),
            plan,
            amount_due,
            wallet_applied,
        })
    }

    /// Starts a purchase
    ///
    /// Stores a pending recharge holding its wallet share and asks the
    /// gateway for a payment intent covering whatever the wallet does not.
    /// When the wallet covers the whole amount there is no gateway leg and
    /// the recharge settles here.
    ///
    /// # Errors
    ///
    /// - `MissingContactInfo` if the user has no verified phone
    /// - `InvalidParameter` for a malformed phone number
    /// - `PlanUnavailable` / `FinancingUnavailable` for catalog preconditions
    /// - `InsufficientBalance` if a concurrent purchase reserved the wallet
    ///   between pricing and storing; nothing is stored
    /// - `GatewayUnavailable` if the gateway fails or times out; the
    ///   recharge stays pending
    #[instrument(skip(self, request), fields(user_id = %user_id, plan_id = %request.plan_id, financed = request.financed))]
    pub async fn initiate(
        &self,
        user_id: UserId,
        request: InitiateRecharge,
    ) -> Result<InitiatedRecharge, RechargeError> {
        let verified_phone = self
            .identity
            .verified_phone(user_id)
            .await?
            .ok_or(RechargeError::MissingContactInfo)?;
        let phone_number = match request.phone_number.as_deref() {
            Some(raw) => PhoneNumber::parse(raw)?,
            None => verified_phone,
        };

        let plan = self.available_plan(request.plan_id).await?;
        let settings = self.settings.finance_settings().await?;
        let (amount_due, financing) = self.price(&plan, request.financed, &settings).await?;

        let wallet = self.store.wallet(user_id).await?;
        let wallet_applied = wallet_share(&wallet, amount_due, request.use_wallet)?;

        let recharge = Recharge::pending(
            user_id,
            plan.id,
            phone_number,
            amount_due,
            wallet_applied,
            TransactionId::new_v7(),
            financing,
        );
        self.store.create_recharge(&recharge).await?;

        info!(
            transaction_id = %recharge.transaction_id,
            phone = %recharge.phone_number.masked(),
            amount_due = %amount_due,
            wallet_applied = %wallet_applied,
            "Recharge initiated"
        );

        if recharge.is_wallet_only() {
            let recharge = match self.settle(&recharge).await? {
                SettlementOutcome::Applied { recharge, .. }
                | SettlementOutcome::AlreadySettled { recharge } => recharge,
            };
            return Ok(InitiatedRecharge {
                recharge,
                redirect_url: None,
            });
        }

        let intent = PaymentIntent {
            transaction_id: recharge.transaction_id,
            user_id,
            amount: recharge.gateway_amount(),
            description: format!("{} {}", plan.operator, plan.name),
            phone_number: Some(recharge.phone_number.clone()),
            return_url: self
                .config
                .return_url(&format!("recharges/{}", recharge.transaction_id.as_uuid())),
        };
        let redirect_url = self
            .call_gateway(
                "create_payment_intent",
                self.gateway.create_payment_intent(&intent),
            )
            .await?;

        Ok(InitiatedRecharge {
            recharge,
            redirect_url: Some(redirect_url),
        })
    }

    /// Confirms a purchase with the gateway and settles it
    ///
    /// Safe to call repeatedly and concurrently; only one call settles.
    ///
    /// # Errors
    ///
    /// - `VerificationPending` while the gateway has no final state
    /// - `GatewayUnavailable` if the gateway fails or times out
    #[instrument(skip(self), fields(user_id = %user_id, transaction_id = %transaction_id))]
    pub async fn verify(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<VerificationOutcome, RechargeError> {
        let recharge = self.recharge(user_id, transaction_id).await?;
        match recharge.status {
            PaymentStatus::Completed => return Ok(VerificationOutcome::AlreadySettled(recharge)),
            PaymentStatus::Failed | PaymentStatus::RefundDue => {
                return Ok(VerificationOutcome::Failed(recharge))
            }
            PaymentStatus::Pending => {}
        }

        let state = if recharge.is_wallet_only() {
            GatewayPaymentState::Completed
        } else {
            self.gateway_state(transaction_id, recharge.created_at).await?
        };

        match state {
            GatewayPaymentState::Completed => match self.settle(&recharge).await? {
                SettlementOutcome::Applied { recharge, wallet } => {
                    info!(balance = %wallet.balance, "Recharge settled");
                    Ok(VerificationOutcome::Settled(recharge))
                }
                SettlementOutcome::AlreadySettled { recharge } => {
                    Ok(VerificationOutcome::AlreadySettled(recharge))
                }
            },
            GatewayPaymentState::Failed => {
                let recharge = self.store.mark_failed(transaction_id).await?;
                if recharge.status == PaymentStatus::Completed {
                    warn!("Gateway reported failure for a settled recharge");
                    return Ok(VerificationOutcome::AlreadySettled(recharge));
                }
                info!("Recharge payment failed");
                Ok(VerificationOutcome::Failed(recharge))
            }
            GatewayPaymentState::Pending => {
                Err(RechargeError::VerificationPending(transaction_id.to_string()))
            }
        }
    }

    /// A recharge owned by the user, in any state
    pub async fn recharge(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<Recharge, RechargeError> {
        let recharge = self
            .store
            .get_recharge(transaction_id)
            .await
            .map_err(|e| RechargeError::from_lookup("Recharge", e))?;
        if recharge.user_id != user_id {
            return Err(RechargeError::not_found("Recharge", transaction_id));
        }
        Ok(recharge)
    }

    // ========================================================================
    // Installments
    // ========================================================================

    /// Starts a gateway payment for one pending installment
    ///
    /// An installment has at most one open attempt. An earlier attempt still
    /// pending is checked with the gateway first; only a failed one lets a
    /// new attempt start.
    ///
    /// # Errors
    ///
    /// - `InstallmentAlreadyPaid` if the installment (or its open attempt) is paid
    /// - `InstallmentPaymentInProgress` while the open attempt is unresolved
    #[instrument(skip(self), fields(user_id = %user_id, installment_id = %installment_id))]
    pub async fn initiate_installment_payment(
        &self,
        user_id: UserId,
        installment_id: InstallmentId,
    ) -> Result<InstallmentPaymentStarted, RechargeError> {
        let installment = self.owned_installment(user_id, installment_id).await?;
        if installment.is_paid() {
            return Err(RechargeError::InstallmentAlreadyPaid(installment_id));
        }

        if let Some(open) = self.store.pending_installment_payment(installment_id).await? {
            match self.verify_installment_payment(user_id, open.transaction_id).await {
                Ok(InstallmentVerification::Failed(_)) => {}
                Ok(_) => return Err(RechargeError::InstallmentAlreadyPaid(installment_id)),
                Err(RechargeError::VerificationPending(_)) => {
                    return Err(RechargeError::InstallmentPaymentInProgress(installment_id))
                }
                Err(e) => return Err(e),
            }
        }

        let payment = InstallmentPayment::pending(installment_id, user_id, installment.amount);
        self.store
            .create_installment_payment(&payment)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    RechargeError::InstallmentPaymentInProgress(installment_id)
                } else {
                    e.into()
                }
            })?;

        let intent = PaymentIntent {
            transaction_id: payment.transaction_id,
            user_id,
            amount: payment.amount,
            description: format!("Installment {}", installment.sequence),
            phone_number: None,
            return_url: self
                .config
                .return_url(&format!("installments/payments/{}", payment.transaction_id.as_uuid())),
        };
        let redirect_url = self
            .call_gateway(
                "create_payment_intent",
                self.gateway.create_payment_intent(&intent),
            )
            .await?;

        info!(transaction_id = %payment.transaction_id, amount = %payment.amount, "Installment payment initiated");
        Ok(InstallmentPaymentStarted {
            payment,
            redirect_url,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id, transaction_id = %transaction_id))]
    pub async fn verify_installment_payment(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<InstallmentVerification, RechargeError> {
        let payment = self.installment_payment(user_id, transaction_id).await?;
        match payment.status {
            PaymentStatus::Completed => {
                let installment = self.owned_installment(user_id, payment.installment_id).await?;
                return Ok(InstallmentVerification::AlreadyPaid(installment));
            }
            PaymentStatus::Failed => return Ok(InstallmentVerification::Failed(payment)),
            PaymentStatus::RefundDue => return Ok(InstallmentVerification::RefundDue(payment)),
            PaymentStatus::Pending => {}
        }

        let state = self.gateway_state(transaction_id, payment.created_at).await?;
        match state {
            GatewayPaymentState::Completed => {
                match self.store.settle_installment_payment(transaction_id, Utc::now()).await? {
                    InstallmentSettlementOutcome::Paid { installment } => {
                        info!(sequence = installment.sequence, "Installment paid");
                        Ok(InstallmentVerification::Paid(installment))
                    }
                    InstallmentSettlementOutcome::AlreadySettled { installment } => {
                        Ok(InstallmentVerification::AlreadyPaid(installment))
                    }
                    InstallmentSettlementOutcome::RefundDue { payment, installment } => {
                        warn!(
                            installment_id = %installment.id,
                            paid_by = ?installment.transaction_id,
                            amount = %payment.amount,
                            "Installment already paid; collected amount is due back to the user"
                        );
                        Ok(InstallmentVerification::RefundDue(payment))
                    }
                }
            }
            GatewayPaymentState::Failed => {
                let payment = self.store.mark_installment_payment_failed(transaction_id).await?;
                Ok(InstallmentVerification::Failed(payment))
            }
            GatewayPaymentState::Pending => {
                Err(RechargeError::VerificationPending(transaction_id.to_string()))
            }
        }
    }

    /// An installment payment attempt owned by the user, in any state
    pub async fn installment_payment(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<InstallmentPayment, RechargeError> {
        let payment = self
            .store
            .get_installment_payment(transaction_id)
            .await
            .map_err(|e| RechargeError::from_lookup("InstallmentPayment", e))?;
        if payment.user_id != user_id {
            return Err(RechargeError::not_found("InstallmentPayment", transaction_id));
        }
        Ok(payment)
    }

    /// The user's installments with their standing on `as_of`
    pub async fn installments(
        &self,
        user_id: UserId,
        as_of: NaiveDate,
    ) -> Result<Vec<InstallmentView>, RechargeError> {
        let installments = self.store.installments(user_id).await?;
        Ok(installments
            .into_iter()
            .map(|installment| InstallmentView {
                standing: installment.standing(as_of),
                installment,
            })
            .collect())
    }

    pub async fn wallet(&self, user_id: UserId) -> Result<WalletSummary, RechargeError> {
        let account = self.store.wallet(user_id).await?;
        let transactions = self.store.wallet_transactions(user_id).await?;
        Ok(WalletSummary {
            account,
            transactions,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn available_plan(&self, plan_id: PlanId) -> Result<Plan, RechargeError> {
        let plan = match self.catalog.get_plan(plan_id).await {
            Ok(plan) => plan,
            Err(e) if e.is_not_found() => return Err(RechargeError::PlanUnavailable(plan_id)),
            Err(e) => return Err(e.into()),
        };
        if !plan.is_active || plan.amount.currency() != self.config.currency {
            return Err(RechargeError::PlanUnavailable(plan_id));
        }
        Ok(plan)
    }

    /// Amount due at purchase, plus financing terms when financed
    async fn price(
        &self,
        plan: &Plan,
        financed: bool,
        settings: &FinanceSettings,
    ) -> Result<(Money, Option<FinancingTerms>), RechargeError> {
        if !financed {
            return Ok((plan.amount, None));
        }
        let options = self.catalog.financing_options(plan.id).await?;
        let option = select_financing_option(plan.id, plan.is_multi_month, &options)?;
        let params = FinancingParams::resolve(option, settings);
        let breakdown = calculate_breakdown(plan.amount, &params)?;

        Ok((
            breakdown.first_payment,
            Some(FinancingTerms {
                financing_id: FinancingId::new_v7(),
                option_id: option.id,
                breakdown,
            }),
        ))
    }

    async fn settle(&self, recharge: &Recharge) -> Result<SettlementOutcome, RechargeError> {
        let settings = self.settings.finance_settings().await?;
        let settled_at = Utc::now();

        let schedule = recharge.financing.as_ref().map(|terms| ScheduleInsert {
            financing_id: terms.financing_id,
            installments: generate_schedule(
                terms.financing_id,
                recharge.id,
                recharge.user_id,
                &terms.breakdown,
                settled_at,
                recharge.transaction_id,
            ),
        });

        let settlement = Settlement {
            transaction_id: recharge.transaction_id,
            user_id: recharge.user_id,
            settled_at,
            wallet_debit: Some(recharge.wallet_amount_used).filter(Money::is_positive),
            schedule,
            cashback: cashback_for(recharge.is_financing(), &settings),
        };

        self.store.settle(settlement).await.map_err(|e| {
            warn!(transaction_id = %recharge.transaction_id, error = %e, "Settlement rejected");
            e
        })
    }

    async fn owned_installment(
        &self,
        user_id: UserId,
        installment_id: InstallmentId,
    ) -> Result<Installment, RechargeError> {
        let installment = self
            .store
            .get_installment(installment_id)
            .await
            .map_err(|e| RechargeError::from_lookup("Installment", e))?;
        if installment.user_id != user_id {
            return Err(RechargeError::not_found("Installment", installment_id));
        }
        Ok(installment)
    }

    /// Gateway state of a payment stored at `created_at`
    ///
    /// Once an intent could no longer be in flight (one gateway timeout after
    /// the record was stored), a gateway that has never heard of the
    /// transaction means the intent was never created, and the payment is
    /// treated as failed so its record and any wallet hold are released.
    async fn gateway_state(
        &self,
        transaction_id: TransactionId,
        created_at: DateTime<Utc>,
    ) -> Result<GatewayPaymentState, RechargeError> {
        let intent_window_closed = (Utc::now() - created_at)
            .to_std()
            .map(|age| age >= self.config.gateway_timeout)
            .unwrap_or(false);

        let lookup = async {
            match self.gateway.payment_state(transaction_id).await {
                Err(e) if e.is_not_found() && intent_window_closed => {
                    warn!(transaction_id = %transaction_id, "Gateway has no payment for this transaction");
                    Ok(GatewayPaymentState::Failed)
                }
                other => other,
            }
        };
        self.call_gateway("payment_state", lookup).await
    }

    /// Runs a gateway call under the configured timeout
    async fn call_gateway<T, F>(&self, operation: &'static str, call: F) -> Result<T, RechargeError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        match tokio::time::timeout(self.config.gateway_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, error = %e, "Gateway call failed");
                Err(RechargeError::GatewayUnavailable(e.to_string()))
            }
            Err(_) => {
                let timeout_ms = self.config.gateway_timeout.as_millis();
                warn!(operation, timeout_ms = timeout_ms as u64, "Gateway call timed out");
                Err(RechargeError::GatewayUnavailable(format!(
                    "{} timed out after {}ms",
                    operation, timeout_ms
                )))
            }
        }
    }
}

/// Wallet amount applied to `amount_due`, honouring the wallet's default flag
///
/// Only the balance not held by other pending purchases is applied.
fn wallet_share(
    wallet: &WalletAccount,
    amount_due: Money,
    use_wallet: Option<bool>,
) -> Result<Money, RechargeError> {
    if use_wallet.unwrap_or(wallet.use_for_recharge) {
        Ok(compute_deduction(wallet.available(), amount_due)?)
    } else {
        Ok(Money::zero(amount_due.currency()))
    }
}
