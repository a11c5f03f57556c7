//! Pre-built Test Fixtures
//!
//! Consistent, predictable test data. The reference purchase is the ₹349
//! multi-month plan financed over three installments of ₹358.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::{Currency, Money, PhoneNumber};
use domain_financing::FinanceSettings;
use domain_recharge::Plan;

pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Price of the reference multi-month plan
    pub fn inr_349() -> Money {
        Money::inr(dec!(349))
    }

    pub fn inr_199() -> Money {
        Money::inr(dec!(199))
    }

    /// Wallet top-up that partially covers the first installment
    pub fn inr_200() -> Money {
        Money::inr(dec!(200))
    }

    /// First installment of the reference plan
    pub fn inr_358() -> Money {
        Money::inr(dec!(358))
    }

    pub fn inr_zero() -> Money {
        Money::zero(Currency::INR)
    }

    /// For currency mismatch tests
    pub fn usd_10() -> Money {
        Money::new(dec!(10), Currency::USD)
    }
}

pub struct PlanFixtures;

impl PlanFixtures {
    /// ₹349, 84 days, eligible for financing
    pub fn quarterly() -> Plan {
        Plan::new("Jio", "84 days unlimited", MoneyFixtures::inr_349(), 84).multi_month()
    }

    /// ₹199, 28 days
    pub fn monthly() -> Plan {
        Plan::new("Jio", "28 days unlimited", MoneyFixtures::inr_199(), 28)
    }

    pub fn withdrawn() -> Plan {
        Plan::new("Airtel", "Discontinued", Money::inr(dec!(99)), 28).inactive()
    }
}

pub struct PhoneFixtures;

impl PhoneFixtures {
    pub const VERIFIED: &'static str = "9876543210";
    pub const ALTERNATE: &'static str = "9123456780";

    pub fn verified() -> PhoneNumber {
        PhoneNumber::parse(Self::VERIFIED).unwrap()
    }

    pub fn alternate() -> PhoneNumber {
        PhoneNumber::parse(Self::ALTERNATE).unwrap()
    }
}

pub struct DateFixtures;

impl DateFixtures {
    /// Reference purchase time
    pub fn purchase_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 10, 30, 0).unwrap()
    }

    pub fn purchase_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }
}

pub struct SettingsFixtures;

impl SettingsFixtures {
    /// ₹50 cashback, 2% fee, 18% tax, 3 installments, multiplier 3
    pub fn standard() -> FinanceSettings {
        FinanceSettings::default()
    }

    pub fn without_cashback() -> FinanceSettings {
        FinanceSettings {
            cashback_amount: MoneyFixtures::inr_zero(),
            ..FinanceSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_fixtures() {
        assert!(PlanFixtures::quarterly().is_multi_month);
        assert!(!PlanFixtures::monthly().is_multi_month);
        assert!(!PlanFixtures::withdrawn().is_active);
    }

    #[test]
    fn test_standard_settings() {
        let settings = SettingsFixtures::standard();
        assert_eq!(settings.cashback_amount, Money::inr(dec!(50)));
        assert_eq!(settings.installment_count, 3);
    }

    #[test]
    fn test_dates_agree() {
        assert_eq!(DateFixtures::purchase_time().date_naive(), DateFixtures::purchase_date());
    }
}
