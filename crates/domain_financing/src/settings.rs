//! Financing terms supplied by the catalog and the settings provider

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, FinancingOptionId, Money, PlanId, Rate};

/// A catalog entry offering financing for one plan
///
/// Any term left as `None` falls back to the corresponding
/// [`FinanceSettings`] default when the financing parameters are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingOption {
    pub id: FinancingOptionId,
    pub plan_id: PlanId,
    pub installment_count: Option<u32>,
    pub processing_fee_rate: Option<Rate>,
    pub tax_rate: Option<Rate>,
    pub is_active: bool,
}

impl FinancingOption {
    /// Creates an active option that uses every settings default
    pub fn new(plan_id: PlanId) -> Self {
        Self {
            id: FinancingOptionId::new_v7(),
            plan_id,
            installment_count: None,
            processing_fee_rate: None,
            tax_rate: None,
            is_active: true,
        }
    }

    pub fn with_installment_count(mut self, count: u32) -> Self {
        self.installment_count = Some(count);
        self
    }

    pub fn with_processing_fee_rate(mut self, rate: Rate) -> Self {
        self.processing_fee_rate = Some(rate);
        self
    }

    pub fn with_tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns true if this option is live for the given plan
    pub fn offers(&self, plan_id: PlanId) -> bool {
        self.is_active && self.plan_id == plan_id
    }
}

/// Business defaults from the settings provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceSettings {
    /// Wallet credit granted for a financed purchase
    pub cashback_amount: Money,
    pub processing_fee_rate: Rate,
    pub tax_rate: Rate,
    pub installment_count: u32,
    /// Number of plan periods bundled into one financed purchase
    pub period_multiplier: u32,
}

impl Default for FinanceSettings {
    fn default() -> Self {
        Self {
            cashback_amount: Money::new(dec!(50), Currency::INR),
            processing_fee_rate: Rate::new(dec!(0.02)),
            tax_rate: Rate::new(dec!(0.18)),
            installment_count: 3,
            period_multiplier: 3,
        }
    }
}
