//! Financing Domain - EMI breakdowns and installment schedules
//!
//! This crate turns a recharge plan's price into a financed purchase:
//!
//! - [`calculator`] computes the [`FinancingBreakdown`] (processing fee,
//!   tax on the fee, total with charges, ceiling-rounded installment)
//! - [`schedule`] generates the installment rows for a settled purchase,
//!   the first one already paid and the rest due at 30-day intervals
//! - [`eligibility`] holds the single financing and cashback predicates
//! - [`standing`] classifies installments for the EMI tracker
//!
//! Everything here is pure; persistence and payment live in `domain_recharge`.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_financing::{FinancingParams, calculate_breakdown};
//!
//! let params = FinancingParams::resolve(&option, &settings);
//! let breakdown = calculate_breakdown(plan.amount, &params)?;
//! assert_eq!(breakdown.first_payment, breakdown.installment_amount);
//! ```

pub mod calculator;
pub mod schedule;
pub mod eligibility;
pub mod settings;
pub mod standing;
pub mod error;

pub use calculator::{calculate_breakdown, FinancingBreakdown, FinancingParams};
pub use schedule::{
    ensure_schedule_absent, generate_schedule, Installment, InstallmentStatus,
    INSTALLMENT_INTERVAL_DAYS,
};
pub use eligibility::{cashback_for, select_financing_option};
pub use settings::{FinanceSettings, FinancingOption};
pub use standing::{InstallmentStanding, DUE_SOON_WINDOW_DAYS};
pub use error::FinancingError;
