//! API error handling
//!
//! Every failure leaves as `{error, message, details?}` with a status code
//! that tells the client whether to retry, fix its input, or give up.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_recharge::RechargeError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// The user must change something (verify a phone, pick another plan)
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The payment has not reached a final state; poll again
    #[error("Pending: {0}")]
    Pending(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<Vec<String>>,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::InsufficientBalance(_) => (StatusCode::CONFLICT, "insufficient_balance"),
            ApiError::PreconditionFailed(_) => (StatusCode::PRECONDITION_FAILED, "precondition_failed"),
            ApiError::Pending(_) => (StatusCode::ACCEPTED, "pending"),
            ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        };

        let (message, details) = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::InsufficientBalance(msg)
            | ApiError::PreconditionFailed(msg)
            | ApiError::Pending(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => (msg, None),
            ApiError::Unauthorized => ("Unauthorized".to_string(), None),
            ApiError::Validation { message, details } => (message, details),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<RechargeError> for ApiError {
    fn from(err: RechargeError) -> Self {
        let message = err.to_string();
        match err {
            RechargeError::InvalidParameter(_) => ApiError::validation(message),
            RechargeError::InsufficientBalance { .. } => ApiError::InsufficientBalance(message),
            RechargeError::MissingContactInfo
            | RechargeError::PlanUnavailable(_)
            | RechargeError::FinancingUnavailable(_) => ApiError::PreconditionFailed(message),
            RechargeError::GatewayUnavailable(_) => ApiError::ServiceUnavailable(message),
            RechargeError::VerificationPending(_) => ApiError::Pending(message),
            RechargeError::SettlementConflict(_)
            | RechargeError::InstallmentAlreadyPaid(_)
            | RechargeError::InstallmentPaymentInProgress(_) => ApiError::Conflict(message),
            RechargeError::NotFound { .. } => ApiError::NotFound(message),
            RechargeError::DuplicateSchedule(_) => {
                error!(error = %message, "Installment schedule guard tripped");
                ApiError::Internal(message)
            }
            RechargeError::Storage(port) if port.is_not_found() => ApiError::NotFound(message),
            RechargeError::Storage(port) if port.is_transient() => {
                ApiError::ServiceUnavailable(message)
            }
            RechargeError::Storage(_) => {
                error!(error = %message, "Storage failure");
                ApiError::Internal("Storage failure".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(_: AuthError) -> Self {
        ApiError::Unauthorized
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();

        ApiError::Validation {
            message: "Request validation failed".to_string(),
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{InstallmentId, Money, PlanId, PortError};
    use rust_decimal_macros::dec;

    fn status(err: RechargeError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_recharge_error_status_codes() {
        assert_eq!(status(RechargeError::InvalidParameter("phone".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(RechargeError::InsufficientBalance {
                available: Money::inr(dec!(10)),
                requested: Money::inr(dec!(100)),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(RechargeError::MissingContactInfo), StatusCode::PRECONDITION_FAILED);
        assert_eq!(status(RechargeError::PlanUnavailable(PlanId::new())), StatusCode::PRECONDITION_FAILED);
        assert_eq!(status(RechargeError::GatewayUnavailable("timeout".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(RechargeError::VerificationPending("TXN".into())), StatusCode::ACCEPTED);
        assert_eq!(status(RechargeError::SettlementConflict("failed".into())), StatusCode::CONFLICT);
        assert_eq!(status(RechargeError::InstallmentAlreadyPaid(InstallmentId::new())), StatusCode::CONFLICT);
        assert_eq!(
            status(RechargeError::InstallmentPaymentInProgress(InstallmentId::new())),
            StatusCode::CONFLICT
        );
        assert_eq!(status(RechargeError::not_found("Recharge", "TXN")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(RechargeError::DuplicateSchedule(core_kernel::FinancingId::new())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_errors_by_kind() {
        assert_eq!(
            status(RechargeError::Storage(PortError::connection("reset"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(RechargeError::Storage(PortError::internal("bug"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_storage_message_hidden() {
        let api = ApiError::from(RechargeError::Storage(PortError::internal("password=hunter2")));
        assert!(matches!(api, ApiError::Internal(ref msg) if msg == "Storage failure"));
    }
}
