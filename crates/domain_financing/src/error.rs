//! Financing domain errors

use core_kernel::{FinancingId, InstallmentId, MoneyError, PlanId};
use thiserror::Error;

/// Errors that can occur in the financing domain
#[derive(Debug, Error)]
pub enum FinancingError {
    /// A calculator input was out of range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// The plan cannot be financed
    #[error("Financing unavailable for plan {plan_id}: {reason}")]
    FinancingUnavailable {
        plan_id: PlanId,
        reason: String,
    },

    /// Installments already exist for this financed purchase
    #[error("Installment schedule already exists for {0}")]
    DuplicateSchedule(FinancingId),

    /// Installment is not in a state that allows the operation
    #[error("Installment {id} cannot be {action}: already {status}")]
    InvalidInstallmentState {
        id: InstallmentId,
        action: &'static str,
        status: String,
    },

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl FinancingError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        FinancingError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn unavailable(plan_id: PlanId, reason: impl Into<String>) -> Self {
        FinancingError::FinancingUnavailable {
            plan_id,
            reason: reason.into(),
        }
    }
}
