//! Installment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use core_kernel::{InstallmentId, TransactionId};

use crate::auth::AuthUser;
use crate::dto::installments::*;
use crate::{error::ApiError, AppState};

/// Lists the caller's installments, ordered by due date
pub async fn list_installments(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<InstallmentQuery>,
) -> Result<Json<Vec<InstallmentResponse>>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let views = state.orchestrator.installments(user_id, as_of).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

pub async fn pay_installment(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(installment_id): Path<Uuid>,
) -> Result<(StatusCode, Json<InstallmentPaymentResponse>), ApiError> {
    let started = state
        .orchestrator
        .initiate_installment_payment(user_id, InstallmentId::from_uuid(installment_id))
        .await?;
    Ok((StatusCode::CREATED, Json(started.into())))
}

/// A payment attempt, in any state; the gateway returns the user here
pub async fn get_installment_payment(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<InstallmentPaymentStatusResponse>, ApiError> {
    let payment = state
        .orchestrator
        .installment_payment(user_id, TransactionId::from_uuid(transaction_id))
        .await?;
    Ok(Json(payment.into()))
}

pub async fn verify_installment_payment(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<InstallmentVerificationResponse>, ApiError> {
    let verification = state
        .orchestrator
        .verify_installment_payment(user_id, TransactionId::from_uuid(transaction_id))
        .await?;
    Ok(Json(verification.into()))
}
