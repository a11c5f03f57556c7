//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, PhoneNumber, Rate, UserId};
use domain_financing::{FinanceSettings, FinancingParams};

/// Strategy for plan prices between ₹10 and ₹9,999.99, in paise
pub fn plan_amount_strategy() -> impl Strategy<Value = Money> {
    (1_000i64..1_000_000i64).prop_map(|paise| Money::from_minor(paise, Currency::INR))
}

/// Strategy for wallet balances from zero up to ₹5,000, in paise
pub fn wallet_balance_strategy() -> impl Strategy<Value = Money> {
    (0i64..500_000i64).prop_map(|paise| Money::from_minor(paise, Currency::INR))
}

/// Strategy for rates expressed as percentages with two decimals (0% to 30%)
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..3_000u32).prop_map(|n| Decimal::new(i64::from(n), 2))
}

pub fn rate_strategy() -> impl Strategy<Value = Rate> {
    percentage_strategy().prop_map(Rate::from_percentage)
}

pub fn installment_count_strategy() -> impl Strategy<Value = u32> {
    1u32..=12u32
}

pub fn period_multiplier_strategy() -> impl Strategy<Value = u32> {
    1u32..=12u32
}

/// Strategy for valid financing parameters
pub fn financing_params_strategy() -> impl Strategy<Value = FinancingParams> {
    (
        period_multiplier_strategy(),
        rate_strategy(),
        rate_strategy(),
        installment_count_strategy(),
    )
        .prop_map(
            |(period_multiplier, processing_fee_rate, tax_rate, installment_count)| {
                FinancingParams {
                    period_multiplier,
                    processing_fee_rate,
                    tax_rate,
                    installment_count,
                }
            },
        )
}

/// Strategy for finance settings with a cashback between ₹0 and ₹200
pub fn finance_settings_strategy() -> impl Strategy<Value = FinanceSettings> {
    (financing_params_strategy(), 0i64..=200i64).prop_map(|(params, cashback)| FinanceSettings {
        cashback_amount: Money::from_minor(cashback * 100, Currency::INR),
        processing_fee_rate: params.processing_fee_rate,
        tax_rate: params.tax_rate,
        installment_count: params.installment_count,
        period_multiplier: params.period_multiplier,
    })
}

/// Strategy for ten-digit mobile numbers starting 6-9
pub fn phone_digits_strategy() -> impl Strategy<Value = String> {
    "[6-9][0-9]{9}".prop_map(|s| s)
}

pub fn phone_strategy() -> impl Strategy<Value = PhoneNumber> {
    phone_digits_strategy().prop_filter_map("valid phone", |digits| PhoneNumber::parse(&digits).ok())
}

/// Strategy for phone input with formatting noise that parsing must strip
pub fn formatted_phone_strategy() -> impl Strategy<Value = (String, String)> {
    (phone_digits_strategy(), 0u8..3u8).prop_map(|(digits, style)| {
        let formatted = match style {
            0 => format!("+91{}", digits),
            1 => format!("0{}", digits),
            _ => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        };
        (formatted, digits)
    })
}

pub fn user_id_strategy() -> impl Strategy<Value = UserId> {
    any::<[u8; 16]>().prop_map(|bytes| UserId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn plan_amounts_are_positive(amount in plan_amount_strategy()) {
            prop_assert!(amount.is_positive());
            prop_assert_eq!(amount.currency(), Currency::INR);
        }

        #[test]
        fn rates_are_not_negative(rate in rate_strategy()) {
            prop_assert!(!rate.is_negative());
        }

        #[test]
        fn generated_phones_round_trip(phone in phone_strategy()) {
            prop_assert_eq!(phone.as_str().len(), 10);
        }

        #[test]
        fn formatted_phones_normalize((input, digits) in formatted_phone_strategy()) {
            let phone = PhoneNumber::parse(&input).unwrap();
            prop_assert_eq!(phone.as_str(), digits.as_str());
        }

        #[test]
        fn params_are_usable(params in financing_params_strategy()) {
            prop_assert!(params.installment_count >= 1);
            prop_assert!(params.period_multiplier >= 1);
        }
    }
}
