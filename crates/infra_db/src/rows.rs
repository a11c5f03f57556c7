//! Database row types and their mapping to domain values
//!
//! Rows mirror the tables in `migrations/` one to one. Money is stored as
//! an amount column plus a currency code; rates are stored as percentages.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use core_kernel::{
    Currency, FinancingId, FinancingOptionId, InstallmentId, Money, PhoneNumber, PlanId, Rate,
    RechargeId, TransactionId, UserId, WalletTransactionId,
};
use domain_financing::{
    FinanceSettings, FinancingBreakdown, FinancingOption, Installment, InstallmentStatus,
};
use domain_recharge::{FinancingTerms, InstallmentPayment, PaymentStatus, Plan, Recharge};
use domain_wallet::{EntryType, WalletAccount, WalletTransaction};

use crate::error::DatabaseError;

// ============================================================================
// Enum types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum DbPaymentStatus {
    Pending,
    Completed,
    Failed,
    RefundDue,
}

impl From<DbPaymentStatus> for PaymentStatus {
    fn from(status: DbPaymentStatus) -> Self {
        match status {
            DbPaymentStatus::Pending => PaymentStatus::Pending,
            DbPaymentStatus::Completed => PaymentStatus::Completed,
            DbPaymentStatus::Failed => PaymentStatus::Failed,
            DbPaymentStatus::RefundDue => PaymentStatus::RefundDue,
        }
    }
}

impl From<PaymentStatus> for DbPaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => DbPaymentStatus::Pending,
            PaymentStatus::Completed => DbPaymentStatus::Completed,
            PaymentStatus::Failed => DbPaymentStatus::Failed,
            PaymentStatus::RefundDue => DbPaymentStatus::RefundDue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "emi_status", rename_all = "snake_case")]
pub enum DbEmiStatus {
    Pending,
    Paid,
}

impl From<DbEmiStatus> for InstallmentStatus {
    fn from(status: DbEmiStatus) -> Self {
        match status {
            DbEmiStatus::Pending => InstallmentStatus::Pending,
            DbEmiStatus::Paid => InstallmentStatus::Paid,
        }
    }
}

impl From<InstallmentStatus> for DbEmiStatus {
    fn from(status: InstallmentStatus) -> Self {
        match status {
            InstallmentStatus::Pending => DbEmiStatus::Pending,
            InstallmentStatus::Paid => DbEmiStatus::Paid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "wallet_entry_type", rename_all = "snake_case")]
pub enum DbEntryType {
    Credit,
    Debit,
}

impl From<DbEntryType> for EntryType {
    fn from(entry_type: DbEntryType) -> Self {
        match entry_type {
            DbEntryType::Credit => EntryType::Credit,
            DbEntryType::Debit => EntryType::Debit,
        }
    }
}

impl From<EntryType> for DbEntryType {
    fn from(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Credit => DbEntryType::Credit,
            EntryType::Debit => DbEntryType::Debit,
        }
    }
}

// ============================================================================
// Field helpers
// ============================================================================

pub(crate) fn money(amount: Decimal, currency: &str) -> Result<Money, DatabaseError> {
    let currency = Currency::from_code(currency.trim()).map_err(DatabaseError::serialization)?;
    Ok(Money::new(amount, currency))
}

fn count(value: i32, column: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value)
        .map_err(|_| DatabaseError::serialization(format!("{} out of range: {}", column, value)))
}

fn phone(value: &str) -> Result<PhoneNumber, DatabaseError> {
    PhoneNumber::parse(value).map_err(DatabaseError::serialization)
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub phone_number: Option<String>,
    pub phone_verified: bool,
}

impl ProfileRow {
    /// The verified phone number, if any
    pub fn verified_phone(&self) -> Result<Option<PhoneNumber>, DatabaseError> {
        match (&self.phone_number, self.phone_verified) {
            (Some(number), true) => phone(number).map(Some),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanRow {
    pub plan_id: Uuid,
    pub operator: String,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub validity_days: i32,
    pub is_multi_month: bool,
    pub is_active: bool,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DatabaseError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Plan {
            id: PlanId::from_uuid(row.plan_id),
            amount: money(row.amount, &row.currency)?,
            validity_days: count(row.validity_days, "validity_days")?,
            operator: row.operator,
            name: row.name,
            is_multi_month: row.is_multi_month,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FinancingOptionRow {
    pub option_id: Uuid,
    pub plan_id: Uuid,
    pub installment_count: Option<i32>,
    /// Percentage, e.g. 2.00
    pub processing_fee: Option<Decimal>,
    pub gst_percentage: Option<Decimal>,
    pub is_active: bool,
}

impl TryFrom<FinancingOptionRow> for FinancingOption {
    type Error = DatabaseError;

    fn try_from(row: FinancingOptionRow) -> Result<Self, Self::Error> {
        Ok(FinancingOption {
            id: FinancingOptionId::from_uuid(row.option_id),
            plan_id: PlanId::from_uuid(row.plan_id),
            installment_count: row
                .installment_count
                .map(|c| count(c, "installment_count"))
                .transpose()?,
            processing_fee_rate: row.processing_fee.map(Rate::from_percentage),
            tax_rate: row.gst_percentage.map(Rate::from_percentage),
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FinanceSettingsRow {
    pub cashback_amount: Decimal,
    pub currency: String,
    pub processing_fee: Decimal,
    pub gst_percentage: Decimal,
    pub installment_count: i32,
    pub period_multiplier: i32,
}

impl TryFrom<FinanceSettingsRow> for FinanceSettings {
    type Error = DatabaseError;

    fn try_from(row: FinanceSettingsRow) -> Result<Self, Self::Error> {
        Ok(FinanceSettings {
            cashback_amount: money(row.cashback_amount, &row.currency)?,
            processing_fee_rate: Rate::from_percentage(row.processing_fee),
            tax_rate: Rate::from_percentage(row.gst_percentage),
            installment_count: count(row.installment_count, "installment_count")?,
            period_multiplier: count(row.period_multiplier, "period_multiplier")?,
        })
    }
}

// ============================================================================
// Recharges
// ============================================================================

/// Column list matching [`RechargeRow`]; the breakdown is read back as text
pub(crate) const RECHARGE_COLUMNS: &str = "recharge_id, user_id, plan_id, phone_number, \
    total_amount, wallet_amount_used, currency, payment_status, transaction_id, \
    financing_id, financing_option_id, financing_breakdown::text AS financing_breakdown, \
    created_at, settled_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RechargeRow {
    pub recharge_id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub phone_number: String,
    pub total_amount: Decimal,
    pub wallet_amount_used: Decimal,
    pub currency: String,
    pub payment_status: DbPaymentStatus,
    pub transaction_id: Uuid,
    pub financing_id: Option<Uuid>,
    pub financing_option_id: Option<Uuid>,
    /// JSON-encoded [`FinancingBreakdown`]
    pub financing_breakdown: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<RechargeRow> for Recharge {
    type Error = DatabaseError;

    fn try_from(row: RechargeRow) -> Result<Self, Self::Error> {
        let financing = match (row.financing_id, row.financing_option_id, row.financing_breakdown) {
            (Some(financing_id), Some(option_id), Some(breakdown)) => Some(FinancingTerms {
                financing_id: FinancingId::from_uuid(financing_id),
                option_id: FinancingOptionId::from_uuid(option_id),
                breakdown: serde_json::from_str::<FinancingBreakdown>(&breakdown)
                    .map_err(DatabaseError::serialization)?,
            }),
            (None, _, _) => None,
            _ => {
                return Err(DatabaseError::serialization(format!(
                    "recharge {} has incomplete financing terms",
                    row.recharge_id
                )))
            }
        };

        Ok(Recharge {
            id: RechargeId::from_uuid(row.recharge_id),
            user_id: UserId::from_uuid(row.user_id),
            plan_id: PlanId::from_uuid(row.plan_id),
            phone_number: phone(&row.phone_number)?,
            total_amount: money(row.total_amount, &row.currency)?,
            wallet_amount_used: money(row.wallet_amount_used, &row.currency)?,
            status: row.payment_status.into(),
            transaction_id: TransactionId::from_uuid(row.transaction_id),
            financing,
            created_at: row.created_at,
            settled_at: row.settled_at,
        })
    }
}

pub(crate) fn breakdown_json(terms: &FinancingTerms) -> Result<String, DatabaseError> {
    serde_json::to_string(&terms.breakdown).map_err(DatabaseError::serialization)
}

// ============================================================================
// Installments
// ============================================================================

pub(crate) const INSTALLMENT_COLUMNS: &str = "emi_id, financing_id, recharge_id, user_id, \
    emi_number, amount, currency, due_date, status, paid_at, transaction_id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstallmentRow {
    pub emi_id: Uuid,
    pub financing_id: Uuid,
    pub recharge_id: Uuid,
    pub user_id: Uuid,
    pub emi_number: i32,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub status: DbEmiStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = DatabaseError;

    fn try_from(row: InstallmentRow) -> Result<Self, Self::Error> {
        Ok(Installment {
            id: InstallmentId::from_uuid(row.emi_id),
            financing_id: FinancingId::from_uuid(row.financing_id),
            recharge_id: RechargeId::from_uuid(row.recharge_id),
            user_id: UserId::from_uuid(row.user_id),
            sequence: count(row.emi_number, "emi_number")?,
            amount: money(row.amount, &row.currency)?,
            due_date: row.due_date,
            status: row.status.into(),
            paid_at: row.paid_at,
            transaction_id: row.transaction_id.map(TransactionId::from_uuid),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstallmentPaymentRow {
    pub transaction_id: Uuid,
    pub emi_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_status: DbPaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<InstallmentPaymentRow> for InstallmentPayment {
    type Error = DatabaseError;

    fn try_from(row: InstallmentPaymentRow) -> Result<Self, Self::Error> {
        Ok(InstallmentPayment {
            transaction_id: TransactionId::from_uuid(row.transaction_id),
            installment_id: InstallmentId::from_uuid(row.emi_id),
            user_id: UserId::from_uuid(row.user_id),
            amount: money(row.amount, &row.currency)?,
            status: row.payment_status.into(),
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletRow {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub reserved: Decimal,
    pub currency: String,
    pub use_for_recharge: bool,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for WalletAccount {
    type Error = DatabaseError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(WalletAccount {
            user_id: UserId::from_uuid(row.user_id),
            balance: money(row.balance, &row.currency)?,
            reserved: money(row.reserved, &row.currency)?,
            use_for_recharge: row.use_for_recharge,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) const WALLET_TRANSACTION_COLUMNS: &str =
    "id, user_id, type AS entry_type, amount, currency, description, reference, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletTransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_type: DbEntryType,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WalletTransactionRow> for WalletTransaction {
    type Error = DatabaseError;

    fn try_from(row: WalletTransactionRow) -> Result<Self, Self::Error> {
        Ok(WalletTransaction {
            id: WalletTransactionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            entry_type: row.entry_type.into(),
            amount: money(row.amount, &row.currency)?,
            description: row.description,
            reference: row.reference,
            created_at: row.created_at,
        })
    }
}

/// Converts a batch of rows, failing on the first bad one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}
