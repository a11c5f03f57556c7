//! Wallet domain errors

use core_kernel::{Money, MoneyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    /// Deduction larger than the available balance
    #[error("Insufficient wallet balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Money,
        requested: Money,
    },

    /// Ledger amounts must be strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}
