//! Custom Test Assertions
//!
//! Assertion helpers with messages that name the domain values involved.

use chrono::Duration;
use rust_decimal::Decimal;

use core_kernel::Money;
use domain_financing::{FinancingBreakdown, Installment, InstallmentStatus, INSTALLMENT_INTERVAL_DAYS};
use domain_wallet::{WalletAccount, WalletTransaction};

/// Asserts an INR-agnostic amount, ignoring decimal scale
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Expected {} {}, got {}",
        actual.currency().symbol(),
        expected,
        actual
    );
}

/// Asserts that two Money values are equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies differ or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts a schedule generated at settlement matches its breakdown:
/// one row per installment, all of the installment amount, due dates 30
/// days apart, and only the first row paid
pub fn assert_schedule_matches(installments: &[Installment], breakdown: &FinancingBreakdown) {
    assert_eq!(
        installments.len(),
        breakdown.installment_count as usize,
        "Expected {} installments, got {}",
        breakdown.installment_count,
        installments.len()
    );

    for (index, installment) in installments.iter().enumerate() {
        assert_eq!(installment.sequence as usize, index + 1, "Installments out of order");
        assert_eq!(
            installment.amount, breakdown.installment_amount,
            "Installment #{} has amount {}, expected {}",
            installment.sequence, installment.amount, breakdown.installment_amount
        );

        let expected_status = if index == 0 {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Pending
        };
        assert_eq!(
            installment.status, expected_status,
            "Installment #{} has status {:?}",
            installment.sequence, installment.status
        );

        if index > 0 {
            let gap = installment.due_date - installments[index - 1].due_date;
            assert_eq!(
                gap,
                Duration::days(INSTALLMENT_INTERVAL_DAYS),
                "Installment #{} is due {} days after the previous one",
                installment.sequence,
                gap.num_days()
            );
        }
    }
}

/// Asserts the wallet balance equals the sum of its signed ledger entries
pub fn assert_ledger_balanced(wallet: &WalletAccount, ledger: &[WalletTransaction]) {
    let sum: Decimal = ledger
        .iter()
        .filter(|t| t.user_id == wallet.user_id)
        .map(|t| t.signed_amount().amount())
        .sum();
    assert_eq!(
        sum,
        wallet.balance.amount(),
        "Ledger sums to {} but the wallet holds {}",
        sum,
        wallet.balance
    );
}

/// Asserts exactly one credit carries `reference`
pub fn assert_single_credit(ledger: &[WalletTransaction], reference: &str) {
    let credits = ledger
        .iter()
        .filter(|t| t.is_credit() && t.reference.as_deref() == Some(reference))
        .count();
    assert_eq!(credits, 1, "Expected one credit for {}, found {}", reference, credits);
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
