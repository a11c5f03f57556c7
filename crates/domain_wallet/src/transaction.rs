//! Wallet ledger entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Money, UserId, WalletTransactionId};

use crate::error::WalletError;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(EntryType::Credit),
            "debit" => Ok(EntryType::Debit),
            other => Err(WalletError::InvalidAmount(format!("unknown entry type '{}'", other))),
        }
    }
}

/// An append-only record of one balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: WalletTransactionId,
    pub user_id: UserId,
    pub entry_type: EntryType,
    /// Always positive; the direction is carried by `entry_type`
    pub amount: Money,
    pub description: String,
    /// External key, e.g. the gateway transaction id
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub(crate) fn new(
        user_id: UserId,
        entry_type: EntryType,
        amount: Money,
        description: impl Into<String>,
        reference: Option<&str>,
    ) -> Result<Self, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "{} amount must be positive, got {}",
                entry_type, amount
            )));
        }
        Ok(Self {
            id: WalletTransactionId::new_v7(),
            user_id,
            entry_type,
            amount,
            description: description.into(),
            reference: reference.map(str::to_string),
            created_at: Utc::now(),
        })
    }

    pub fn is_credit(&self) -> bool {
        self.entry_type == EntryType::Credit
    }

    /// Amount with sign applied: positive for credits, negative for debits
    pub fn signed_amount(&self) -> Money {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}
