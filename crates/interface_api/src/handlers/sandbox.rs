//! Sandbox gateway handlers
//!
//! Stand in for the gateway's hosted checkout: a test client decides how
//! a pending payment ends, then calls the verify endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use core_kernel::{PortError, TransactionId};

use crate::dto::sandbox::{SandboxOutcome, SandboxOutcomeRequest};
use crate::{error::ApiError, AppState};

pub async fn resolve_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<SandboxOutcomeRequest>,
) -> Result<StatusCode, ApiError> {
    let gateway = state
        .sandbox
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Sandbox gateway is not enabled".to_string()))?;
    let transaction_id = TransactionId::from_uuid(transaction_id);

    let result = match request.outcome {
        SandboxOutcome::Completed => gateway.complete(transaction_id).await,
        SandboxOutcome::Failed => gateway.fail(transaction_id).await,
    };
    result.map_err(|e: PortError| {
        if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else if e.is_conflict() {
            ApiError::Conflict(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    })?;

    info!(transaction_id = %transaction_id, outcome = ?request.outcome, "Sandbox payment resolved");
    Ok(StatusCode::NO_CONTENT)
}
