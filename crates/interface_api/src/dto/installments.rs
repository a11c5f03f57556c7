//! Installment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::Money;
use domain_financing::{Installment, InstallmentStanding};
use domain_recharge::{
    InstallmentPayment, InstallmentPaymentStarted, InstallmentVerification, InstallmentView,
};

#[derive(Debug, Default, Deserialize)]
pub struct InstallmentQuery {
    /// Date standings are computed against; defaults to today (UTC)
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct InstallmentResponse {
    pub id: Uuid,
    pub financing_id: Uuid,
    pub recharge_id: Uuid,
    pub sequence: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standing: Option<InstallmentStanding>,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
}

impl From<Installment> for InstallmentResponse {
    fn from(installment: Installment) -> Self {
        Self {
            id: *installment.id.as_uuid(),
            financing_id: *installment.financing_id.as_uuid(),
            recharge_id: *installment.recharge_id.as_uuid(),
            sequence: installment.sequence,
            amount: installment.amount,
            due_date: installment.due_date,
            status: installment.status.as_str().to_string(),
            standing: None,
            paid_at: installment.paid_at,
            transaction_id: installment.transaction_id.map(|t| *t.as_uuid()),
        }
    }
}

impl From<InstallmentView> for InstallmentResponse {
    fn from(view: InstallmentView) -> Self {
        Self {
            standing: Some(view.standing),
            ..view.installment.into()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstallmentPaymentResponse {
    pub transaction_id: Uuid,
    pub installment_id: Uuid,
    pub amount: Money,
    pub status: String,
    pub redirect_url: String,
}

impl From<InstallmentPaymentStarted> for InstallmentPaymentResponse {
    fn from(started: InstallmentPaymentStarted) -> Self {
        Self {
            transaction_id: *started.payment.transaction_id.as_uuid(),
            installment_id: *started.payment.installment_id.as_uuid(),
            amount: started.payment.amount,
            status: started.payment.status.as_str().to_string(),
            redirect_url: started.redirect_url,
        }
    }
}

/// One payment attempt, as stored
#[derive(Debug, Serialize)]
pub struct InstallmentPaymentStatusResponse {
    pub transaction_id: Uuid,
    pub installment_id: Uuid,
    pub amount: Money,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<InstallmentPayment> for InstallmentPaymentStatusResponse {
    fn from(payment: InstallmentPayment) -> Self {
        Self {
            transaction_id: *payment.transaction_id.as_uuid(),
            installment_id: *payment.installment_id.as_uuid(),
            amount: payment.amount,
            status: payment.status.as_str().to_string(),
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstallmentVerificationResponse {
    /// `paid`, `already_paid`, `failed` or `refund_due`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment: Option<InstallmentResponse>,
    /// The attempt, when it did not pay the installment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<InstallmentPaymentStatusResponse>,
}

impl From<InstallmentVerification> for InstallmentVerificationResponse {
    fn from(verification: InstallmentVerification) -> Self {
        match verification {
            InstallmentVerification::Paid(installment) => Self {
                outcome: "paid".to_string(),
                installment: Some(installment.into()),
                payment: None,
            },
            InstallmentVerification::AlreadyPaid(installment) => Self {
                outcome: "already_paid".to_string(),
                installment: Some(installment.into()),
                payment: None,
            },
            InstallmentVerification::Failed(payment) => Self {
                outcome: "failed".to_string(),
                installment: None,
                payment: Some(payment.into()),
            },
            InstallmentVerification::RefundDue(payment) => Self {
                outcome: "refund_due".to_string(),
                installment: None,
                payment: Some(payment.into()),
            },
        }
    }
}
