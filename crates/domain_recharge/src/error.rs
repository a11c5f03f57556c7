//! Recharge domain errors
//!
//! Errors fall into three groups the caller handles differently:
//! transient (`GatewayUnavailable`, `VerificationPending`, transient
//! storage), business rule / precondition failures that need the user to
//! change something, and guards that indicate a bug (`DuplicateSchedule`).

use thiserror::Error;

use core_kernel::{CoreError, FinancingId, InstallmentId, Money, PlanId, PortError};
use domain_financing::FinancingError;
use domain_wallet::WalletError;

#[derive(Debug, Error)]
pub enum RechargeError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient wallet balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Money,
        requested: Money,
    },

    #[error("No verified phone number on file")]
    MissingContactInfo,

    #[error("Plan {0} is unavailable")]
    PlanUnavailable(PlanId),

    #[error("Financing unavailable: {0}")]
    FinancingUnavailable(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The gateway has not reached a final state yet; poll again
    #[error("Payment {0} is still pending at the gateway")]
    VerificationPending(String),

    #[error("Installment schedule already exists for {0}")]
    DuplicateSchedule(FinancingId),

    /// The record changed state underneath this operation
    #[error("Settlement conflict: {0}")]
    SettlementConflict(String),

    #[error("Installment {0} is already paid")]
    InstallmentAlreadyPaid(InstallmentId),

    /// Another payment attempt for the installment is still open at the gateway
    #[error("Installment {0} has a payment in progress")]
    InstallmentPaymentInProgress(InstallmentId),

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl RechargeError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RechargeError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for failures that may succeed if the same call is retried
    pub fn is_retryable(&self) -> bool {
        match self {
            RechargeError::GatewayUnavailable(_) | RechargeError::VerificationPending(_) => true,
            RechargeError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Maps a storage lookup failure, turning `NotFound` into the domain variant
    pub(crate) fn from_lookup(entity: &'static str, error: PortError) -> Self {
        match error {
            PortError::NotFound { id, .. } => RechargeError::NotFound { entity, id },
            other => RechargeError::Storage(other),
        }
    }
}

impl From<FinancingError> for RechargeError {
    fn from(error: FinancingError) -> Self {
        match error {
            FinancingError::InvalidParameter { .. } => {
                RechargeError::InvalidParameter(error.to_string())
            }
            FinancingError::FinancingUnavailable { .. } => {
                RechargeError::FinancingUnavailable(error.to_string())
            }
            FinancingError::DuplicateSchedule(id) => RechargeError::DuplicateSchedule(id),
            FinancingError::InvalidInstallmentState { id, .. } => {
                RechargeError::InstallmentAlreadyPaid(id)
            }
            FinancingError::Money(e) => RechargeError::InvalidParameter(e.to_string()),
        }
    }
}

impl From<WalletError> for RechargeError {
    fn from(error: WalletError) -> Self {
        match error {
            WalletError::InsufficientBalance { available, requested } => {
                RechargeError::InsufficientBalance { available, requested }
            }
            WalletError::InvalidAmount(msg) => RechargeError::InvalidParameter(msg),
            WalletError::Money(e) => RechargeError::InvalidParameter(e.to_string()),
        }
    }
}

impl From<CoreError> for RechargeError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NotFound(msg) => RechargeError::NotFound { entity: "Record", id: msg },
            other => RechargeError::InvalidParameter(other.to_string()),
        }
    }
}
