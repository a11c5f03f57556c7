//! Recharge Domain - Purchases and payment orchestration
//!
//! This crate ties the financing and wallet domains to the outside world.
//! A purchase is a [`Recharge`] of a catalog [`Plan`], paid either in full
//! or as the first installment of a financed multi-month purchase, with
//! any wallet balance applied first and the remainder collected through
//! the payment gateway.
//!
//! # Lifecycle
//!
//! 1. [`PaymentOrchestrator::initiate`] checks preconditions, prices the
//!    purchase, stores it `pending` and requests a gateway payment intent
//! 2. [`PaymentOrchestrator::verify`] asks the gateway for the final state
//!    and, on success, settles: recharge completed, wallet debited,
//!    schedule created and cashback credited, all at once and exactly once
//! 3. Later installments are paid one at a time through
//!    [`PaymentOrchestrator::initiate_installment_payment`]
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = PaymentOrchestrator::new(identity, catalog, settings, gateway, store, config);
//!
//! let started = orchestrator.initiate(user_id, InitiateRecharge {
//!     plan_id,
//!     financed: true,
//!     phone_number: None,
//!     use_wallet: None,
//! }).await?;
//!
//! // ... user pays at started.redirect_url ...
//!
//! match orchestrator.verify(user_id, started.recharge.transaction_id).await {
//!     Ok(VerificationOutcome::Settled(recharge)) => { /* done */ }
//!     Err(e) if e.is_retryable() => { /* poll again */ }
//!     other => { /* report */ }
//! }
//! ```

pub mod plan;
pub mod recharge;
pub mod ports;
pub mod orchestrator;
pub mod sandbox;
pub mod config;
pub mod error;

pub use plan::Plan;
pub use recharge::{FinancingTerms, InstallmentPayment, PaymentStatus, Recharge};
pub use ports::{
    CatalogPort, GatewayPaymentState, IdentityPort, InstallmentSettlementOutcome,
    PaymentGatewayPort, PaymentIntent, RechargeStore, ScheduleInsert, Settlement,
    SettlementOutcome, SettingsPort,
};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{MockCatalogPort, MockIdentityPort, MockRechargeStore, MockSettingsPort};
pub use orchestrator::{
    InitiateRecharge, InitiatedRecharge, InstallmentPaymentStarted, InstallmentVerification,
    InstallmentView, PaymentOrchestrator, Quote, VerificationOutcome, WalletSummary,
};
pub use sandbox::SandboxGateway;
pub use config::OrchestratorConfig;
pub use error::RechargeError;
