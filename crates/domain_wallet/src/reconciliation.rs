//! Wallet reconciliation
//!
//! Pure functions deciding how much of a wallet pays towards an amount due
//! and producing the balance change plus its ledger entry. Callers persist
//! the returned account and entry together; serialising concurrent
//! mutations of one wallet is the store's job.

use tracing::debug;

use core_kernel::Money;

use crate::account::WalletAccount;
use crate::error::WalletError;
use crate::transaction::{EntryType, WalletTransaction};

/// Portion of `balance` applied to `amount_due`
///
/// Returns `min(balance, amount_due)`, clamped at zero.
pub fn compute_deduction(balance: Money, amount_due: Money) -> Result<Money, WalletError> {
    let zero = Money::zero(balance.currency());
    let deduction = balance.checked_min(&amount_due)?;
    Ok(if deduction.is_negative() { zero } else { deduction })
}

fn ensure_available(account: &WalletAccount, amount: Money) -> Result<(), WalletError> {
    let available = account.available();
    if available.checked_sub(&amount)?.is_negative() {
        return Err(WalletError::InsufficientBalance {
            available,
            requested: amount,
        });
    }
    Ok(())
}

/// Debits the wallet
///
/// Only the available balance can be debited; funds held by [`reserve`]
/// are spent through [`spend_reserved`].
///
/// # Errors
///
/// - `WalletError::InvalidAmount` if `amount` is not positive
/// - `WalletError::InsufficientBalance` if `amount` exceeds the available balance
pub fn apply_deduction(
    account: &WalletAccount,
    amount: Money,
    description: &str,
    reference: Option<&str>,
) -> Result<(WalletAccount, WalletTransaction), WalletError> {
    let entry = WalletTransaction::new(account.user_id, EntryType::Debit, amount, description, reference)?;
    ensure_available(account, amount)?;
    let remaining = account.balance.checked_sub(&amount)?;

    debug!(user_id = %account.user_id, amount = %amount, remaining = %remaining, "Wallet debited");
    Ok((account.with_balance(remaining), entry))
}

/// Holds `amount` of the available balance for a pending recharge
///
/// The balance itself is unchanged and no ledger entry is written; the hold
/// is either spent by [`spend_reserved`] or returned by [`release`].
pub fn reserve(account: &WalletAccount, amount: Money) -> Result<WalletAccount, WalletError> {
    if !amount.is_positive() {
        return Err(WalletError::InvalidAmount(format!("reservation must be positive, got {amount}")));
    }
    ensure_available(account, amount)?;
    let reserved = account.reserved.checked_add(&amount)?;

    debug!(user_id = %account.user_id, amount = %amount, reserved = %reserved, "Wallet funds reserved");
    Ok(account.with_reserved(reserved))
}

/// Returns a hold placed by [`reserve`] to the available balance
pub fn release(account: &WalletAccount, amount: Money) -> Result<WalletAccount, WalletError> {
    let reserved = account.reserved.checked_sub(&amount)?;
    if amount.is_negative() || reserved.is_negative() {
        return Err(WalletError::InvalidAmount(format!(
            "cannot release {amount}, only {} reserved",
            account.reserved
        )));
    }

    debug!(user_id = %account.user_id, amount = %amount, reserved = %reserved, "Wallet reservation released");
    Ok(account.with_reserved(reserved))
}

/// Debits funds previously held by [`reserve`]
pub fn spend_reserved(
    account: &WalletAccount,
    amount: Money,
    description: &str,
    reference: Option<&str>,
) -> Result<(WalletAccount, WalletTransaction), WalletError> {
    let released = release(account, amount)?;
    apply_deduction(&released, amount, description, reference)
}

/// Credits the wallet
///
/// Does not check for an earlier credit with the same reference; use
/// [`credit_once`] when the credit must be idempotent.
pub fn apply_credit(
    account: &WalletAccount,
    amount: Money,
    description: &str,
    reference: Option<&str>,
) -> Result<(WalletAccount, WalletTransaction), WalletError> {
    let entry = WalletTransaction::new(account.user_id, EntryType::Credit, amount, description, reference)?;
    let balance = account.balance.checked_add(&amount)?;

    debug!(user_id = %account.user_id, amount = %amount, balance = %balance, "Wallet credited");
    Ok((account.with_balance(balance), entry))
}

/// True if the ledger already holds a credit keyed by `reference`
pub fn has_credit_with_reference(ledger: &[WalletTransaction], reference: &str) -> bool {
    ledger
        .iter()
        .any(|t| t.is_credit() && t.reference.as_deref() == Some(reference))
}

/// Result of an idempotent credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    Applied {
        account: WalletAccount,
        entry: WalletTransaction,
    },
    /// A credit with this reference was already recorded
    AlreadyCredited,
}

/// Credits the wallet unless `ledger` already has a credit for `reference`
pub fn credit_once(
    account: &WalletAccount,
    ledger: &[WalletTransaction],
    amount: Money,
    description: &str,
    reference: &str,
) -> Result<CreditOutcome, WalletError> {
    if has_credit_with_reference(ledger, reference) {
        debug!(user_id = %account.user_id, reference, "Credit already applied");
        return Ok(CreditOutcome::AlreadyCredited);
    }
    let (account, entry) = apply_credit(account, amount, description, Some(reference))?;
    Ok(CreditOutcome::Applied { account, entry })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use core_kernel::{Currency, UserId};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn deduction_is_bounded(balance in 0i64..10_000_000i64, due in 0i64..10_000_000i64) {
            let b = Money::from_minor(balance, Currency::INR);
            let d = Money::from_minor(due, Currency::INR);
            let deduction = compute_deduction(b, d).unwrap();

            prop_assert!(!deduction.is_negative());
            prop_assert!(deduction.amount() <= b.amount());
            prop_assert!(deduction.amount() <= d.amount());
            prop_assert_eq!(deduction.amount(), b.amount().min(d.amount()));
        }

        #[test]
        fn debit_then_repeated_credit_leaves_one_credit(
            balance in 1i64..1_000_000i64,
            cashback in 1i64..10_000i64,
            repeats in 2usize..6,
        ) {
            let mut wallet = WalletAccount::open(UserId::new(), Currency::INR);
            wallet.balance = Money::from_minor(balance, Currency::INR);
            let mut ledger = Vec::new();

            let (mut wallet, debit) = apply_deduction(&wallet, wallet.balance, "Used for recharge", Some("TXN-1")).unwrap();
            ledger.push(debit);

            for _ in 0..repeats {
                if let CreditOutcome::Applied { account, entry } =
                    credit_once(&wallet, &ledger, Money::from_minor(cashback, Currency::INR), "Cashback", "TXN-1").unwrap()
                {
                    wallet = account;
                    ledger.push(entry);
                }
            }

            let credits = ledger.iter().filter(|t| t.is_credit() && t.reference.as_deref() == Some("TXN-1")).count();
            prop_assert_eq!(credits, 1);
            prop_assert_eq!(wallet.balance, Money::from_minor(cashback, Currency::INR));
        }

        #[test]
        fn reservations_never_exceed_balance(balance in 0i64..1_000_000i64, holds in proptest::collection::vec(1i64..200_000i64, 1..8)) {
            let mut wallet = WalletAccount::open(UserId::new(), Currency::INR);
            wallet.balance = Money::from_minor(balance, Currency::INR);

            for hold in holds {
                if let Ok(held) = reserve(&wallet, Money::from_minor(hold, Currency::INR)) {
                    wallet = held;
                }
                prop_assert!(wallet.reserved.amount() <= wallet.balance.amount());
                prop_assert!(!wallet.available().is_negative());
            }
        }
    }
}
