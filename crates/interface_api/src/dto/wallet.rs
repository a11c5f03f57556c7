//! Wallet DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use core_kernel::Money;
use domain_recharge::WalletSummary;
use domain_wallet::WalletTransaction;

#[derive(Debug, Serialize)]
pub struct WalletTransactionResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub amount: Money,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WalletTransaction> for WalletTransactionResponse {
    fn from(entry: WalletTransaction) -> Self {
        Self {
            id: *entry.id.as_uuid(),
            entry_type: entry.entry_type.as_str().to_string(),
            amount: entry.amount,
            description: entry.description,
            reference: entry.reference,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub balance: Money,
    /// Held by recharges awaiting payment confirmation
    pub reserved: Money,
    /// `balance` less `reserved`; what the next purchase can use
    pub available: Money,
    pub use_for_recharge: bool,
    /// Newest first
    pub transactions: Vec<WalletTransactionResponse>,
}

impl From<WalletSummary> for WalletResponse {
    fn from(summary: WalletSummary) -> Self {
        Self {
            balance: summary.account.balance,
            reserved: summary.account.reserved,
            available: summary.account.available(),
            use_for_recharge: summary.account.use_for_recharge,
            transactions: summary.transactions.into_iter().map(Into::into).collect(),
        }
    }
}
