//! Installment schedule generation
//!
//! A financed purchase is split into `installment_count` rows. Row #1 is the
//! upfront payment collected at purchase time and is created already paid;
//! rows #2..N are created pending, each due 30 days after the previous one.
//! The schedule is generated once per financed purchase.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{FinancingId, InstallmentId, Money, RechargeId, TransactionId, UserId};

use crate::calculator::FinancingBreakdown;
use crate::error::FinancingError;
use crate::standing::InstallmentStanding;

/// Days between consecutive installment due dates
pub const INSTALLMENT_INTERVAL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
        }
    }

    pub fn can_transition_to(&self, target: &InstallmentStatus) -> bool {
        matches!(
            (self, target),
            (InstallmentStatus::Pending, InstallmentStatus::Paid)
        )
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled payment within a financed recharge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub financing_id: FinancingId,
    pub recharge_id: RechargeId,
    pub user_id: UserId,
    /// 1-based position in the schedule
    pub sequence: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<TransactionId>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    /// Records payment of a pending installment
    ///
    /// # Errors
    ///
    /// Returns `FinancingError::InvalidInstallmentState` if already paid.
    pub fn mark_paid(
        &mut self,
        transaction_id: TransactionId,
        paid_at: DateTime<Utc>,
    ) -> Result<(), FinancingError> {
        if !self.status.can_transition_to(&InstallmentStatus::Paid) {
            return Err(FinancingError::InvalidInstallmentState {
                id: self.id,
                action: "paid",
                status: self.status.to_string(),
            });
        }
        self.status = InstallmentStatus::Paid;
        self.paid_at = Some(paid_at);
        self.transaction_id = Some(transaction_id);
        Ok(())
    }

    pub fn standing(&self, as_of: NaiveDate) -> InstallmentStanding {
        InstallmentStanding::classify(self.status, self.due_date, as_of)
    }
}

/// Generates the full installment schedule for a settled financed purchase
///
/// `first_payment_txn` is the gateway transaction that collected the
/// upfront payment; it is recorded on installment #1.
pub fn generate_schedule(
    financing_id: FinancingId,
    recharge_id: RechargeId,
    user_id: UserId,
    breakdown: &FinancingBreakdown,
    created_at: DateTime<Utc>,
    first_payment_txn: TransactionId,
) -> Vec<Installment> {
    let creation_date = created_at.date_naive();

    (1..=breakdown.installment_count)
        .map(|sequence| {
            let offset = Duration::days(INSTALLMENT_INTERVAL_DAYS * i64::from(sequence - 1));
            let first = sequence == 1;
            Installment {
                id: InstallmentId::new_v7(),
                financing_id,
                recharge_id,
                user_id,
                sequence,
                amount: if first {
                    breakdown.first_payment
                } else {
                    breakdown.installment_amount
                },
                due_date: creation_date + offset,
                status: if first {
                    InstallmentStatus::Paid
                } else {
                    InstallmentStatus::Pending
                },
                paid_at: first.then_some(created_at),
                transaction_id: first.then_some(first_payment_txn),
            }
        })
        .collect()
}

/// Rejects regeneration of a schedule that already has rows
pub fn ensure_schedule_absent(
    financing_id: FinancingId,
    existing: &[Installment],
) -> Result<(), FinancingError> {
    if existing.iter().any(|i| i.financing_id == financing_id) {
        return Err(FinancingError::DuplicateSchedule(financing_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{calculate_breakdown, FinancingParams};
    use crate::settings::FinanceSettings;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn schedule_for(count: u32) -> Vec<Installment> {
        let params = FinancingParams {
            installment_count: count,
            ..FinancingParams::from_settings(&FinanceSettings::default())
        };
        let breakdown = calculate_breakdown(Money::inr(dec!(349)), &params).unwrap();
        let created = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();
        generate_schedule(
            FinancingId::new(),
            RechargeId::new(),
            UserId::new(),
            &breakdown,
            created,
            TransactionId::new_v7(),
        )
    }

    #[test]
    fn test_first_installment_is_paid_on_creation_date() {
        let schedule = schedule_for(3);
        let first = &schedule[0];

        assert_eq!(first.sequence, 1);
        assert!(first.is_paid());
        assert_eq!(first.due_date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(first.amount.amount(), dec!(358));
        assert!(first.transaction_id.is_some());
        assert!(first.paid_at.is_some());
    }

    #[test]
    fn test_remaining_installments_are_pending_thirty_days_apart() {
        let schedule = schedule_for(3);

        assert_eq!(schedule[1].due_date, NaiveDate::from_ymd_opt(2026, 2, 14).unwrap());
        assert_eq!(schedule[2].due_date, NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
        for installment in &schedule[1..] {
            assert_eq!(installment.status, InstallmentStatus::Pending);
            assert!(installment.paid_at.is_none());
            assert!(installment.transaction_id.is_none());
        }
    }

    #[test]
    fn test_single_installment_schedule() {
        let schedule = schedule_for(1);
        assert_eq!(schedule.len(), 1);
        assert!(schedule[0].is_paid());
    }

    #[test]
    fn test_mark_paid_only_once() {
        let mut schedule = schedule_for(3);
        let second = &mut schedule[1];

        second.mark_paid(TransactionId::new_v7(), Utc::now()).unwrap();
        assert!(second.is_paid());

        let err = second.mark_paid(TransactionId::new_v7(), Utc::now()).unwrap_err();
        assert!(matches!(err, FinancingError::InvalidInstallmentState { .. }));
    }

    #[test]
    fn test_ensure_schedule_absent() {
        let schedule = schedule_for(3);
        let financing_id = schedule[0].financing_id;

        assert!(ensure_schedule_absent(FinancingId::new(), &schedule).is_ok());
        assert!(matches!(
            ensure_schedule_absent(financing_id, &schedule),
            Err(FinancingError::DuplicateSchedule(id)) if id == financing_id
        ));
        assert!(ensure_schedule_absent(financing_id, &[]).is_ok());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::calculator::{calculate_breakdown, FinancingParams};
    use crate::settings::FinanceSettings;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        #[test]
        fn schedule_has_n_rows_spaced_thirty_days(count in 1u32..37, paise in 1000i64..1_000_000i64) {
            let params = FinancingParams {
                installment_count: count,
                ..FinancingParams::from_settings(&FinanceSettings::default())
            };
            let breakdown = calculate_breakdown(
                Money::from_minor(paise, core_kernel::Currency::INR),
                &params,
            ).unwrap();
            let created = Utc::now();
            let schedule = generate_schedule(
                FinancingId::new(), RechargeId::new(), UserId::new(),
                &breakdown, created, TransactionId::new_v7(),
            );

            prop_assert_eq!(schedule.len(), count as usize);
            prop_assert!(schedule[0].is_paid());
            prop_assert_eq!(schedule[0].due_date, created.date_naive());
            for pair in schedule.windows(2) {
                prop_assert_eq!((pair[1].due_date - pair[0].due_date).num_days(), INSTALLMENT_INTERVAL_DAYS);
                prop_assert_eq!(pair[1].sequence, pair[0].sequence + 1);
                prop_assert_eq!(pair[1].status, InstallmentStatus::Pending);
            }
            let total: Decimal = schedule.iter().map(|i| i.amount.amount()).sum();
            prop_assert!(total >= breakdown.total_with_charges.amount());
        }
    }
}
