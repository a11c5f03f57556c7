//! Wallet handlers

use axum::{extract::State, Extension, Json};

use crate::auth::AuthUser;
use crate::dto::wallet::WalletResponse;
use crate::{error::ApiError, AppState};

/// Balance and ledger, newest entry first
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<WalletResponse>, ApiError> {
    let summary = state.orchestrator.wallet(user_id).await?;
    Ok(Json(summary.into()))
}
