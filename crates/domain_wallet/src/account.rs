//! Per-user wallet account

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, UserId};

/// A user's wallet
///
/// `balance` is never negative and `reserved` never exceeds it; every
/// mutation goes through the reconciliation functions, which return a new
/// account value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: UserId,
    pub balance: Money,
    /// Part of `balance` held for recharges awaiting gateway confirmation
    pub reserved: Money,
    /// Whether recharges apply the wallet by default
    pub use_for_recharge: bool,
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    /// Opens an empty wallet that is applied to recharges by default
    pub fn open(user_id: UserId, currency: Currency) -> Self {
        Self {
            user_id,
            balance: Money::zero(currency),
            reserved: Money::zero(currency),
            use_for_recharge: true,
            updated_at: Utc::now(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    /// Balance not held by a pending recharge
    pub fn available(&self) -> Money {
        self.balance
            .checked_sub(&self.reserved)
            .ok()
            .filter(|available| !available.is_negative())
            .unwrap_or_else(|| Money::zero(self.currency()))
    }

    pub fn has_funds(&self) -> bool {
        self.available().is_positive()
    }

    pub(crate) fn with_balance(&self, balance: Money) -> Self {
        Self {
            balance,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub(crate) fn with_reserved(&self, reserved: Money) -> Self {
        Self {
            reserved,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}
