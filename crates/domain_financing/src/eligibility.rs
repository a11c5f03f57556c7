//! Financing and cashback eligibility
//!
//! Financing is offered when the plan is a multi-month plan AND the catalog
//! holds an active financing option for it. Cashback is earned by financed
//! purchases only. Validity-day counts are never consulted.

use tracing::debug;

use core_kernel::{Money, PlanId};

use crate::error::FinancingError;
use crate::settings::{FinanceSettings, FinancingOption};

/// Picks the active financing option for a plan
///
/// # Errors
///
/// Returns `FinancingError::FinancingUnavailable` when the plan is not a
/// multi-month plan or has no active option.
pub fn select_financing_option(
    plan_id: PlanId,
    plan_is_multi_month: bool,
    options: &[FinancingOption],
) -> Result<&FinancingOption, FinancingError> {
    if !plan_is_multi_month {
        return Err(FinancingError::unavailable(plan_id, "plan is not a multi-month plan"));
    }
    let option = options
        .iter()
        .find(|o| o.offers(plan_id))
        .ok_or_else(|| FinancingError::unavailable(plan_id, "no active financing option"))?;

    debug!(plan_id = %plan_id, option_id = %option.id, "Selected financing option");
    Ok(option)
}

/// Returns the cashback a settled purchase earns, if any
pub fn cashback_for(is_financing: bool, settings: &FinanceSettings) -> Option<Money> {
    (is_financing && settings.cashback_amount.is_positive()).then_some(settings.cashback_amount)
}
