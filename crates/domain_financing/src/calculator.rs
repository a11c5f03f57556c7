//! Financing breakdown calculation
//!
//! Turns a plan price into the amounts a financed purchase is charged:
//!
//! ```text
//! total_amount       = plan_amount × period_multiplier
//! processing_fee     = total_amount × processing_fee_rate
//! tax                = processing_fee × tax_rate
//! total_with_charges = total_amount + processing_fee + tax
//! installment_amount = ceil(total_with_charges / installment_count)
//! first_payment      = installment_amount
//! ```
//!
//! Installments are rounded up to a whole currency unit, so the amount
//! collected over the whole schedule can exceed `total_with_charges` by
//! less than `installment_count` units. That overcollection is accepted
//! and reported by [`FinancingBreakdown::overcollection`]; it is never
//! corrected on the last installment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, Rate};

use crate::error::FinancingError;
use crate::settings::{FinanceSettings, FinancingOption};

/// Inputs to the breakdown calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingParams {
    pub period_multiplier: u32,
    pub processing_fee_rate: Rate,
    pub tax_rate: Rate,
    pub installment_count: u32,
}

impl FinancingParams {
    /// Parameters built purely from the settings defaults
    pub fn from_settings(settings: &FinanceSettings) -> Self {
        Self {
            period_multiplier: settings.period_multiplier,
            processing_fee_rate: settings.processing_fee_rate,
            tax_rate: settings.tax_rate,
            installment_count: settings.installment_count,
        }
    }

    /// Applies the option's overrides on top of the settings defaults
    pub fn resolve(option: &FinancingOption, settings: &FinanceSettings) -> Self {
        let defaults = Self::from_settings(settings);
        Self {
            period_multiplier: defaults.period_multiplier,
            processing_fee_rate: option.processing_fee_rate.unwrap_or(defaults.processing_fee_rate),
            tax_rate: option.tax_rate.unwrap_or(defaults.tax_rate),
            installment_count: option.installment_count.unwrap_or(defaults.installment_count),
        }
    }

    fn validate(&self) -> Result<(), FinancingError> {
        if self.installment_count == 0 {
            return Err(FinancingError::invalid_parameter(
                "installment_count",
                "must be at least 1",
            ));
        }
        if self.period_multiplier == 0 {
            return Err(FinancingError::invalid_parameter(
                "period_multiplier",
                "must be at least 1",
            ));
        }
        if self.processing_fee_rate.is_negative() {
            return Err(FinancingError::invalid_parameter(
                "processing_fee_rate",
                format!("must not be negative, got {}", self.processing_fee_rate),
            ));
        }
        if self.tax_rate.is_negative() {
            return Err(FinancingError::invalid_parameter(
                "tax_rate",
                format!("must not be negative, got {}", self.tax_rate),
            ));
        }
        Ok(())
    }
}

/// The computed decomposition of a financed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingBreakdown {
    pub plan_amount: Money,
    pub period_multiplier: u32,
    pub total_amount: Money,
    pub processing_fee: Money,
    pub tax: Money,
    pub total_with_charges: Money,
    pub installment_count: u32,
    pub installment_amount: Money,
    /// Collected at purchase time; counts as installment #1
    pub first_payment: Money,
}

impl FinancingBreakdown {
    /// Installments still owed after the upfront payment
    pub fn remaining_installments(&self) -> u32 {
        self.installment_count - 1
    }

    pub fn remaining_amount(&self) -> Money {
        self.installment_amount
            .multiply(Decimal::from(self.remaining_installments()))
    }

    /// Sum of every installment, first payment included
    pub fn total_collected(&self) -> Money {
        self.first_payment + self.remaining_amount()
    }

    /// Amount collected beyond `total_with_charges` due to ceiling rounding
    pub fn overcollection(&self) -> Money {
        self.total_collected()
            .checked_sub(&self.total_with_charges)
            .unwrap_or_else(|_| Money::zero(self.total_with_charges.currency()))
    }
}

/// Computes the financing breakdown for a plan price
///
/// # Errors
///
/// Returns `FinancingError::InvalidParameter` if the plan amount is not
/// positive, the installment count or period multiplier is zero, or either
/// rate is negative.
pub fn calculate_breakdown(
    plan_amount: Money,
    params: &FinancingParams,
) -> Result<FinancingBreakdown, FinancingError> {
    if !plan_amount.is_positive() {
        return Err(FinancingError::invalid_parameter(
            "plan_amount",
            format!("must be positive, got {}", plan_amount),
        ));
    }
    params.validate()?;

    let total_amount = plan_amount.multiply(Decimal::from(params.period_multiplier));
    let processing_fee = params.processing_fee_rate.apply(&total_amount);
    let tax = params.tax_rate.apply(&processing_fee);
    let total_with_charges = total_amount
        .checked_add(&processing_fee)?
        .checked_add(&tax)?;

    let installment_amount =
        total_with_charges.divide_ceil(Decimal::from(params.installment_count))?;

    Ok(FinancingBreakdown {
        plan_amount,
        period_multiplier: params.period_multiplier,
        total_amount,
        processing_fee,
        tax,
        total_with_charges,
        installment_count: params.installment_count,
        installment_amount,
        first_payment: installment_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn default_params() -> FinancingParams {
        FinancingParams::from_settings(&FinanceSettings::default())
    }

    #[test]
    fn test_reference_breakdown() {
        let breakdown = calculate_breakdown(Money::inr(dec!(349)), &default_params()).unwrap();

        assert_eq!(breakdown.total_amount.amount(), dec!(1047));
        assert_eq!(breakdown.processing_fee.amount(), dec!(20.94));
        assert_eq!(breakdown.tax.amount(), dec!(3.7692));
        assert_eq!(breakdown.total_with_charges.amount(), dec!(1071.7092));
        assert_eq!(breakdown.installment_amount.amount(), dec!(358));
        assert_eq!(breakdown.first_payment.amount(), dec!(358));
    }

    #[test]
    fn test_derived_totals() {
        let breakdown = calculate_breakdown(Money::inr(dec!(349)), &default_params()).unwrap();

        assert_eq!(breakdown.remaining_installments(), 2);
        assert_eq!(breakdown.remaining_amount().amount(), dec!(716));
        assert_eq!(breakdown.total_collected().amount(), dec!(1074));
        assert_eq!(breakdown.overcollection().amount(), dec!(2.2908));
    }

    #[test]
    fn test_zero_installments_rejected() {
        let params = FinancingParams { installment_count: 0, ..default_params() };
        let err = calculate_breakdown(Money::inr(dec!(349)), &params).unwrap_err();
        assert!(matches!(err, FinancingError::InvalidParameter { name: "installment_count", .. }));
    }

    #[test]
    fn test_non_positive_plan_amount_rejected() {
        for amount in [dec!(0), dec!(-10)] {
            let err = calculate_breakdown(Money::inr(amount), &default_params()).unwrap_err();
            assert!(matches!(err, FinancingError::InvalidParameter { name: "plan_amount", .. }));
        }
    }

    #[test]
    fn test_option_overrides_settings() {
        let option = FinancingOption::new(core_kernel::PlanId::new())
            .with_installment_count(6)
            .with_tax_rate(Rate::zero());
        let params = FinancingParams::resolve(&option, &FinanceSettings::default());

        assert_eq!(params.installment_count, 6);
        assert_eq!(params.tax_rate, Rate::zero());
        assert_eq!(params.processing_fee_rate, Rate::new(dec!(0.02)));
        assert_eq!(params.period_multiplier, 3);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use core_kernel::Currency;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn ceiling_never_undercollects(
            paise in 100i64..10_000_000i64,
            multiplier in 1u32..13,
            fee_bp in 0i64..1000,
            tax_bp in 0i64..3000,
            count in 1u32..25,
        ) {
            let params = FinancingParams {
                period_multiplier: multiplier,
                processing_fee_rate: Rate::new(Decimal::new(fee_bp, 4)),
                tax_rate: Rate::new(Decimal::new(tax_bp, 4)),
                installment_count: count,
            };
            let breakdown = calculate_breakdown(Money::from_minor(paise, Currency::INR), &params).unwrap();

            let collected = breakdown.first_payment.amount() * Decimal::from(count);
            prop_assert!(collected >= breakdown.total_with_charges.amount());
            prop_assert!(breakdown.overcollection().amount() < Decimal::from(count));
            prop_assert_eq!(breakdown.installment_amount.amount().fract(), Decimal::ZERO);
        }
    }
}
