//! Recharge handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{PlanId, TransactionId};
use domain_recharge::InitiateRecharge;

use crate::auth::AuthUser;
use crate::dto::recharge::*;
use crate::{error::ApiError, AppState};

/// Prices a plan for the caller without starting a purchase
pub async fn quote(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state
        .orchestrator
        .quote(user_id, PlanId::from_uuid(plan_id), params.financed, params.use_wallet)
        .await?;
    Ok(Json(quote.into()))
}

/// Starts a purchase
///
/// Responds with the pending recharge and the checkout URL, or with the
/// completed recharge when the wallet covered everything.
pub async fn create_recharge(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<CreateRechargeRequest>,
) -> Result<(StatusCode, Json<InitiateRechargeResponse>), ApiError> {
    request.validate()?;

    let started = state
        .orchestrator
        .initiate(
            user_id,
            InitiateRecharge {
                plan_id: PlanId::from_uuid(request.plan_id),
                financed: request.financed,
                phone_number: request.phone_number,
                use_wallet: request.use_wallet,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(started.into())))
}

pub async fn get_recharge(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<RechargeResponse>, ApiError> {
    let recharge = state
        .orchestrator
        .recharge(user_id, TransactionId::from_uuid(transaction_id))
        .await?;
    Ok(Json(recharge.into()))
}

/// Settles or fails the recharge from the gateway's final state
///
/// 202 while the gateway is still pending.
pub async fn verify_recharge(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<VerifyRechargeResponse>, ApiError> {
    let outcome = state
        .orchestrator
        .verify(user_id, TransactionId::from_uuid(transaction_id))
        .await?;
    Ok(Json(outcome.into()))
}
