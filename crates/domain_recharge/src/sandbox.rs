//! In-process sandbox payment gateway
//!
//! Stands in for a real payment provider. Intents are held in memory as
//! `PENDING` until [`SandboxGateway::complete`] or [`SandboxGateway::fail`]
//! is called (the HTTP layer exposes these on a sandbox route). Latency and
//! outages can be injected to exercise timeout handling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, Money, PortError, TransactionId,
};

use crate::ports::{GatewayPaymentState, PaymentGatewayPort, PaymentIntent};

#[derive(Debug, Clone)]
struct SandboxPayment {
    amount: Money,
    return_url: String,
    state: GatewayPaymentState,
}

#[derive(Debug)]
pub struct SandboxGateway {
    checkout_base_url: String,
    payments: RwLock<HashMap<TransactionId, SandboxPayment>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl SandboxGateway {
    /// `checkout_base_url` is prefixed to the redirect URL of every intent
    pub fn new(checkout_base_url: impl Into<String>) -> Self {
        Self {
            checkout_base_url: checkout_base_url.into().trim_end_matches('/').to_string(),
            payments: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Simulates an outage: every call fails with `ServiceUnavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delays every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn complete(&self, transaction_id: TransactionId) -> Result<(), PortError> {
        self.resolve(transaction_id, GatewayPaymentState::Completed).await
    }

    pub async fn fail(&self, transaction_id: TransactionId) -> Result<(), PortError> {
        self.resolve(transaction_id, GatewayPaymentState::Failed).await
    }

    /// Amount the gateway was asked to collect
    pub async fn requested_amount(&self, transaction_id: TransactionId) -> Option<Money> {
        self.payments.read().await.get(&transaction_id).map(|p| p.amount)
    }

    /// Where checkout sends the user back to
    pub async fn return_url(&self, transaction_id: TransactionId) -> Option<String> {
        self.payments
            .read()
            .await
            .get(&transaction_id)
            .map(|p| p.return_url.clone())
    }

    async fn resolve(&self, transaction_id: TransactionId, state: GatewayPaymentState) -> Result<(), PortError> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&transaction_id)
            .ok_or_else(|| PortError::not_found("GatewayPayment", transaction_id))?;
        if payment.state != GatewayPaymentState::Pending {
            return Err(PortError::conflict(format!(
                "payment {} already {}",
                transaction_id, payment.state
            )));
        }
        payment.state = state;
        info!(transaction_id = %transaction_id, state = %state, "Sandbox payment resolved");
        Ok(())
    }

    async fn simulate_network(&self) -> Result<(), PortError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(PortError::ServiceUnavailable {
                service: "sandbox-gateway".to_string(),
            });
        }
        Ok(())
    }
}

impl DomainPort for SandboxGateway {}

#[async_trait]
impl HealthCheckable for SandboxGateway {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        match self.simulate_network().await {
            Ok(()) => HealthCheckResult::healthy("sandbox-gateway", start.elapsed().as_millis() as u64),
            Err(e) => HealthCheckResult::unhealthy(
                "sandbox-gateway",
                start.elapsed().as_millis() as u64,
                e.to_string(),
            ),
        }
    }
}

#[async_trait]
impl PaymentGatewayPort for SandboxGateway {
    async fn create_payment_intent(&self, intent: &PaymentIntent) -> Result<String, PortError> {
        self.simulate_network().await?;
        let mut payments = self.payments.write().await;
        if payments.contains_key(&intent.transaction_id) {
            return Err(PortError::conflict(format!(
                "payment {} already registered",
                intent.transaction_id
            )));
        }
        payments.insert(
            intent.transaction_id,
            SandboxPayment {
                amount: intent.amount,
                return_url: intent.return_url.clone(),
                state: GatewayPaymentState::Pending,
            },
        );
        debug!(transaction_id = %intent.transaction_id, amount = %intent.amount, "Sandbox intent created");
        Ok(format!("{}/sandbox/checkout/{}", self.checkout_base_url, intent.transaction_id))
    }

    async fn payment_state(&self, transaction_id: TransactionId) -> Result<GatewayPaymentState, PortError> {
        self.simulate_network().await?;
        self.payments
            .read()
            .await
            .get(&transaction_id)
            .map(|p| p.state)
            .ok_or_else(|| PortError::not_found("GatewayPayment", transaction_id))
    }
}
