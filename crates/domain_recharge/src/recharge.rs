//! Recharge purchases and installment payment attempts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    CoreError, FinancingId, FinancingOptionId, InstallmentId, Money, PhoneNumber, PlanId,
    RechargeId, TransactionId, UserId,
};
use domain_financing::FinancingBreakdown;

/// Gateway payment status of a purchase or installment payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    /// Collected by the gateway for an installment another attempt had
    /// already paid; the money is owed back to the user
    RefundDue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::RefundDue => "refund_due",
        }
    }

    /// Only `pending` moves, and only once
    pub fn can_transition_to(&self, target: &PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Pending, PaymentStatus::RefundDue)
        )
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refund_due" => Ok(PaymentStatus::RefundDue),
            other => Err(CoreError::validation(format!("unknown payment status '{}'", other))),
        }
    }
}

/// Financing attached to a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingTerms {
    pub financing_id: FinancingId,
    pub option_id: FinancingOptionId,
    pub breakdown: FinancingBreakdown,
}

/// One user's purchase attempt
///
/// Created `pending` before the gateway is contacted; only a verified
/// gateway result moves it to `completed` or `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recharge {
    pub id: RechargeId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub phone_number: PhoneNumber,
    /// Amount due at purchase: the plan price, or the first installment when financed
    pub total_amount: Money,
    /// Part of `total_amount` reserved from the wallet, debited at settlement
    pub wallet_amount_used: Money,
    pub status: PaymentStatus,
    pub transaction_id: TransactionId,
    pub financing: Option<FinancingTerms>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Recharge {
    pub fn pending(
        user_id: UserId,
        plan_id: PlanId,
        phone_number: PhoneNumber,
        total_amount: Money,
        wallet_amount_used: Money,
        transaction_id: TransactionId,
        financing: Option<FinancingTerms>,
    ) -> Self {
        Self {
            id: RechargeId::new_v7(),
            user_id,
            plan_id,
            phone_number,
            total_amount,
            wallet_amount_used,
            status: PaymentStatus::Pending,
            transaction_id,
            financing,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn is_financing(&self) -> bool {
        self.financing.is_some()
    }

    /// Amount collected through the gateway
    pub fn gateway_amount(&self) -> Money {
        self.total_amount - self.wallet_amount_used
    }

    /// True when the wallet covers the whole amount and no gateway leg exists
    pub fn is_wallet_only(&self) -> bool {
        !self.gateway_amount().is_positive()
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.transition(PaymentStatus::Completed)?;
        self.settled_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), CoreError> {
        self.transition(PaymentStatus::Failed)
    }

    fn transition(&mut self, target: PaymentStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(&target) {
            return Err(CoreError::invalid_state(format!(
                "recharge {} cannot move from {} to {}",
                self.transaction_id, self.status, target
            )));
        }
        self.status = target;
        Ok(())
    }
}

/// A gateway payment attempt for one pending installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPayment {
    pub transaction_id: TransactionId,
    pub installment_id: InstallmentId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl InstallmentPayment {
    pub fn pending(installment_id: InstallmentId, user_id: UserId, amount: Money) -> Self {
        Self {
            transaction_id: TransactionId::new_v7(),
            installment_id,
            user_id,
            amount,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn recharge(total: rust_decimal::Decimal, wallet: rust_decimal::Decimal) -> Recharge {
        Recharge::pending(
            UserId::new(),
            PlanId::new(),
            PhoneNumber::parse("9876543210").unwrap(),
            Money::inr(total),
            Money::inr(wallet),
            TransactionId::new_v7(),
            None,
        )
    }

    #[test]
    fn test_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Completed));
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Failed));
        assert!(!PaymentStatus::Completed.can_transition_to(&PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(&PaymentStatus::Completed));
        assert!(!PaymentStatus::Completed.can_transition_to(&PaymentStatus::Completed));
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::RefundDue));
        assert!(!PaymentStatus::RefundDue.can_transition_to(&PaymentStatus::Completed));
        assert!(PaymentStatus::RefundDue.is_final());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("completed".parse::<PaymentStatus>().unwrap(), PaymentStatus::Completed);
        assert_eq!("refund_due".parse::<PaymentStatus>().unwrap(), PaymentStatus::RefundDue);
        assert!("COMPLETED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_gateway_amount() {
        let r = recharge(dec!(358), dec!(200));
        assert_eq!(r.gateway_amount().amount(), dec!(158));
        assert!(!r.is_wallet_only());
        assert!(recharge(dec!(349), dec!(349)).is_wallet_only());
    }

    #[test]
    fn test_complete_once() {
        let mut r = recharge(dec!(349), dec!(0));
        r.complete(Utc::now()).unwrap();
        assert_eq!(r.status, PaymentStatus::Completed);
        assert!(r.settled_at.is_some());
        assert!(r.complete(Utc::now()).is_err());
        assert!(r.fail().is_err());
    }
}
