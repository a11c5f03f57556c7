//! Installment standing for the EMI tracker

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schedule::InstallmentStatus;

/// An unpaid installment due within this many days is due soon
pub const DUE_SOON_WINDOW_DAYS: i64 = 3;

/// How an installment stands relative to a given date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStanding {
    Paid,
    Overdue,
    DueSoon,
    Upcoming,
}

impl InstallmentStanding {
    pub fn classify(status: InstallmentStatus, due_date: NaiveDate, as_of: NaiveDate) -> Self {
        if status == InstallmentStatus::Paid {
            return InstallmentStanding::Paid;
        }
        let days_left = (due_date - as_of).num_days();
        if days_left < 0 {
            InstallmentStanding::Overdue
        } else if days_left <= DUE_SOON_WINDOW_DAYS {
            InstallmentStanding::DueSoon
        } else {
            InstallmentStanding::Upcoming
        }
    }

    /// True for standings that need the user's attention
    pub fn needs_attention(&self) -> bool {
        matches!(self, InstallmentStanding::Overdue | InstallmentStanding::DueSoon)
    }
}
