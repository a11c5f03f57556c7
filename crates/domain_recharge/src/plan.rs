//! Recharge plans from the catalog

use serde::{Deserialize, Serialize};

use core_kernel::{Money, PlanId};

/// A recharge offering
///
/// Read-only to this crate; the catalog owns plan data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub operator: String,
    pub name: String,
    /// Price of one plan period
    pub amount: Money,
    pub validity_days: u32,
    /// Multi-month plans may be financed
    pub is_multi_month: bool,
    pub is_active: bool,
}

impl Plan {
    pub fn new(operator: impl Into<String>, name: impl Into<String>, amount: Money, validity_days: u32) -> Self {
        Self {
            id: PlanId::new_v7(),
            operator: operator.into(),
            name: name.into(),
            amount,
            validity_days,
            is_multi_month: false,
            is_active: true,
        }
    }

    pub fn multi_month(mut self) -> Self {
        self.is_multi_month = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
