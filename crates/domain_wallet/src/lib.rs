//! Wallet Domain - Balance reconciliation and ledger
//!
//! Every user has one [`WalletAccount`] whose balance never goes negative.
//! A recharge awaiting gateway confirmation holds its wallet share with
//! [`reserve`]; the hold is spent on settlement ([`spend_reserved`]) or
//! returned when the payment fails ([`release`]). Balance changes happen
//! only through [`apply_deduction`] and [`apply_credit`], each of which returns the updated account together with
//! the [`WalletTransaction`] ledger entry that records it. Ledger entries
//! are append-only.
//!
//! Cashback credits are keyed by the gateway transaction id; callers use
//! [`credit_once`] (or [`has_credit_with_reference`]) so a retried
//! settlement never credits twice.

pub mod account;
pub mod transaction;
pub mod reconciliation;
pub mod error;

pub use account::WalletAccount;
pub use transaction::{EntryType, WalletTransaction};
pub use reconciliation::{
    apply_credit, apply_deduction, compute_deduction, credit_once, has_credit_with_reference,
    release, reserve, spend_reserved, CreditOutcome,
};
pub use error::WalletError;
