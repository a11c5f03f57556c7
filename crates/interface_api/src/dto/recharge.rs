//! Recharge DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_financing::FinancingBreakdown;
use domain_recharge::{InitiatedRecharge, Quote, Recharge, VerificationOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct QuoteParams {
    #[serde(default)]
    pub financed: bool,
    pub use_wallet: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRechargeRequest {
    pub plan_id: Uuid,
    #[serde(default)]
    pub financed: bool,
    /// Defaults to the caller's verified number
    #[validate(length(min = 10, max = 16, message = "must be a 10-digit mobile number"))]
    pub phone_number: Option<String>,
    pub use_wallet: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub plan_id: Uuid,
    pub operator: String,
    pub plan_name: String,
    pub validity_days: u32,
    pub amount_due: Money,
    pub wallet_applied: Money,
    pub payable: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashback: Option<Money>,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            plan_id: *quote.plan.id.as_uuid(),
            operator: quote.plan.operator,
            plan_name: quote.plan.name,
            validity_days: quote.plan.validity_days,
            amount_due: quote.amount_due,
            wallet_applied: quote.wallet_applied,
            payable: quote.payable,
            financing: quote.financing,
            cashback: quote.cashback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RechargeResponse {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub plan_id: Uuid,
    pub phone_number: String,
    pub total_amount: Money,
    pub wallet_amount_used: Money,
    pub status: String,
    pub is_financing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financing_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingBreakdown>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<Recharge> for RechargeResponse {
    fn from(recharge: Recharge) -> Self {
        let is_financing = recharge.is_financing();
        Self {
            id: *recharge.id.as_uuid(),
            transaction_id: *recharge.transaction_id.as_uuid(),
            plan_id: *recharge.plan_id.as_uuid(),
            phone_number: recharge.phone_number.to_string(),
            total_amount: recharge.total_amount,
            wallet_amount_used: recharge.wallet_amount_used,
            status: recharge.status.as_str().to_string(),
            is_financing,
            financing_id: recharge.financing.as_ref().map(|f| *f.financing_id.as_uuid()),
            financing: recharge.financing.map(|f| f.breakdown),
            created_at: recharge.created_at,
            settled_at: recharge.settled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InitiateRechargeResponse {
    pub recharge: RechargeResponse,
    /// Absent when the wallet covered the purchase
    pub redirect_url: Option<String>,
}

impl From<InitiatedRecharge> for InitiateRechargeResponse {
    fn from(started: InitiatedRecharge) -> Self {
        Self {
            recharge: started.recharge.into(),
            redirect_url: started.redirect_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyRechargeResponse {
    /// `settled`, `already_settled` or `failed`
    pub outcome: String,
    pub recharge: RechargeResponse,
}

impl From<VerificationOutcome> for VerifyRechargeResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        let (label, recharge) = match outcome {
            VerificationOutcome::Settled(r) => ("settled", r),
            VerificationOutcome::AlreadySettled(r) => ("already_settled", r),
            VerificationOutcome::Failed(r) => ("failed", r),
        };
        Self {
            outcome: label.to_string(),
            recharge: recharge.into(),
        }
    }
}
