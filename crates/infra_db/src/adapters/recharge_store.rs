//! PostgreSQL recharge store
//!
//! Creating a recharge locks the wallet row (`SELECT ... FOR UPDATE`) and
//! moves its wallet share into `wallet_balance.reserved` in the same
//! transaction as the insert. Marking it failed returns the hold.
//!
//! Settlement runs in one transaction:
//!
//! 1. lock the recharge row and compare-and-set `pending -> completed`
//! 2. lock the wallet row and debit the hold
//! 3. insert the schedule, guarded by `(financing_id, emi_number)`
//! 4. credit cashback, guarded by the partial unique index on credit
//!    references
//!
//! Any failure drops the transaction, which rolls everything back and
//! leaves the recharge `pending`.
//!
//! The partial unique index `idx_emi_payments_open` allows one pending
//! attempt per installment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    Currency, DomainPort, FinancingId, HealthCheckResult, HealthCheckable, InstallmentId, Money,
    PortError, TransactionId, UserId,
};
use domain_financing::{ensure_schedule_absent, Installment};
use domain_recharge::{
    InstallmentPayment, InstallmentSettlementOutcome, PaymentStatus, Recharge, RechargeError,
    RechargeStore, Settlement, SettlementOutcome,
};
use domain_wallet::{
    credit_once, release, reserve, spend_reserved, CreditOutcome, WalletAccount, WalletTransaction,
};

use crate::error::DatabaseError;
use crate::rows::{
    breakdown_json, convert_all, DbEmiStatus, DbEntryType, DbPaymentStatus, InstallmentPaymentRow,
    InstallmentRow, RechargeRow, WalletRow, WalletTransactionRow, INSTALLMENT_COLUMNS,
    RECHARGE_COLUMNS, WALLET_TRANSACTION_COLUMNS,
};

const WALLET_DEBIT_DESCRIPTION: &str = "Used for recharge";
const CASHBACK_DESCRIPTION: &str = "Cashback for financed recharge";

const INSTALLMENT_PAYMENT_COLUMNS: &str =
    "transaction_id, emi_id, user_id, amount, currency, payment_status, created_at";

#[derive(Debug, Clone)]
pub struct PostgresRechargeStore {
    pool: PgPool,
    /// Currency for wallets opened by this store
    currency: Currency,
}

impl PostgresRechargeStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            currency: Currency::default(),
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }
}

// ============================================================================
// Queries shared by the pool and transactions
// ============================================================================

async fn fetch_recharge(
    conn: &mut PgConnection,
    transaction_id: TransactionId,
    for_update: bool,
) -> Result<Recharge, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM user_recharges WHERE transaction_id = $1{}",
        RECHARGE_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, RechargeRow>(&sql)
        .bind(*transaction_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Recharge", transaction_id))?;
    Recharge::try_from(row)
}

/// Opens the wallet if needed and returns it locked
async fn lock_wallet(
    conn: &mut PgConnection,
    user_id: UserId,
    currency: Currency,
) -> Result<WalletAccount, DatabaseError> {
    sqlx::query(
        "INSERT INTO wallet_balance (user_id, currency) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(*user_id.as_uuid())
    .bind(currency.code())
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query_as::<_, WalletRow>(
        r#"
        SELECT user_id, balance, reserved, currency, use_for_recharge, updated_at
        FROM wallet_balance
        WHERE user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(*user_id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;
    WalletAccount::try_from(row)
}

async fn update_wallet(conn: &mut PgConnection, wallet: &WalletAccount) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE wallet_balance SET balance = $2, reserved = $3, updated_at = $4 WHERE user_id = $1")
        .bind(*wallet.user_id.as_uuid())
        .bind(wallet.balance.amount())
        .bind(wallet.reserved.amount())
        .bind(wallet.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Inserts a ledger entry; returns false if a credit with the same
/// reference already exists
async fn insert_wallet_entry(
    conn: &mut PgConnection,
    entry: &WalletTransaction,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        r#"
        INSERT INTO wallet_transactions
            (id, user_id, type, amount, currency, description, reference, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (reference) WHERE type = 'credit' DO NOTHING
        "#,
    )
    .bind(*entry.id.as_uuid())
    .bind(*entry.user_id.as_uuid())
    .bind(DbEntryType::from(entry.entry_type))
    .bind(entry.amount.amount())
    .bind(entry.amount.currency().code())
    .bind(&entry.description)
    .bind(entry.reference.as_deref())
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

async fn credits_with_reference(
    conn: &mut PgConnection,
    user_id: UserId,
    reference: &str,
) -> Result<Vec<WalletTransaction>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM wallet_transactions WHERE user_id = $1 AND reference = $2 AND type = 'credit'",
        WALLET_TRANSACTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, WalletTransactionRow>(&sql)
        .bind(*user_id.as_uuid())
        .bind(reference)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

async fn schedule_rows(
    conn: &mut PgConnection,
    financing_id: FinancingId,
) -> Result<Vec<Installment>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM emi_transactions WHERE financing_id = $1 ORDER BY emi_number",
        INSTALLMENT_COLUMNS
    );
    let rows = sqlx::query_as::<_, InstallmentRow>(&sql)
        .bind(*financing_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

async fn insert_installment(conn: &mut PgConnection, installment: &Installment) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO emi_transactions
            (emi_id, financing_id, recharge_id, user_id, emi_number, amount,
             currency, due_date, status, paid_at, transaction_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(*installment.id.as_uuid())
    .bind(*installment.financing_id.as_uuid())
    .bind(*installment.recharge_id.as_uuid())
    .bind(*installment.user_id.as_uuid())
    .bind(installment.sequence as i32)
    .bind(installment.amount.amount())
    .bind(installment.amount.currency().code())
    .bind(installment.due_date)
    .bind(DbEmiStatus::from(installment.status))
    .bind(installment.paid_at)
    .bind(installment.transaction_id.map(|t| *t.as_uuid()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_installment(
    conn: &mut PgConnection,
    installment_id: InstallmentId,
    for_update: bool,
) -> Result<Installment, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM emi_transactions WHERE emi_id = $1{}",
        INSTALLMENT_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, InstallmentRow>(&sql)
        .bind(*installment_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Installment", installment_id))?;
    Installment::try_from(row)
}

async fn fetch_installment_payment(
    conn: &mut PgConnection,
    transaction_id: TransactionId,
    for_update: bool,
) -> Result<InstallmentPayment, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM emi_payments WHERE transaction_id = $1{}",
        INSTALLMENT_PAYMENT_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, InstallmentPaymentRow>(&sql)
        .bind(*transaction_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("InstallmentPayment", transaction_id))?;
    InstallmentPayment::try_from(row)
}

/// Maps a lookup failure to the domain's not-found variant
fn lookup_error(entity: &'static str, error: DatabaseError) -> RechargeError {
    match error {
        DatabaseError::NotFound { id, .. } => RechargeError::NotFound { entity, id },
        other => other.into(),
    }
}

impl DomainPort for PostgresRechargeStore {}

#[async_trait]
impl HealthCheckable for PostgresRechargeStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-recharge-store").await
    }
}

#[async_trait]
impl RechargeStore for PostgresRechargeStore {
    #[instrument(skip(self, recharge), fields(transaction_id = %recharge.transaction_id))]
    async fn create_recharge(&self, recharge: &Recharge) -> Result<(), RechargeError> {
        let breakdown = recharge.financing.as_ref().map(breakdown_json).transpose()?;
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        if recharge.wallet_amount_used.is_positive() {
            let wallet = lock_wallet(&mut tx, recharge.user_id, self.currency).await?;
            let held = reserve(&wallet, recharge.wallet_amount_used)?;
            update_wallet(&mut tx, &held).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO user_recharges
                (recharge_id, user_id, plan_id, phone_number, total_amount,
                 wallet_amount_used, currency, payment_status, transaction_id,
                 is_financing, financing_id, financing_option_id, financing_breakdown,
                 created_at, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13::jsonb, $14, $15)
            "#,
        )
        .bind(*recharge.id.as_uuid())
        .bind(*recharge.user_id.as_uuid())
        .bind(*recharge.plan_id.as_uuid())
        .bind(recharge.phone_number.as_str())
        .bind(recharge.total_amount.amount())
        .bind(recharge.wallet_amount_used.amount())
        .bind(recharge.total_amount.currency().code())
        .bind(DbPaymentStatus::from(recharge.status))
        .bind(*recharge.transaction_id.as_uuid())
        .bind(recharge.is_financing())
        .bind(recharge.financing.as_ref().map(|f| *f.financing_id.as_uuid()))
        .bind(recharge.financing.as_ref().map(|f| *f.option_id.as_uuid()))
        .bind(breakdown)
        .bind(recharge.created_at)
        .bind(recharge.settled_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(reserved = %recharge.wallet_amount_used, "Recharge stored");
        Ok(())
    }

    async fn get_recharge(&self, transaction_id: TransactionId) -> Result<Recharge, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(fetch_recharge(&mut conn, transaction_id, false).await?)
    }

    #[instrument(skip(self, settlement), fields(transaction_id = %settlement.transaction_id, user_id = %settlement.user_id))]
    async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, RechargeError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let mut recharge = fetch_recharge(&mut tx, settlement.transaction_id, true)
            .await
            .map_err(|e| lookup_error("Recharge", e))?;
        match recharge.status {
            PaymentStatus::Completed => {
                debug!("Already settled");
                return Ok(SettlementOutcome::AlreadySettled { recharge });
            }
            PaymentStatus::Failed | PaymentStatus::RefundDue => {
                return Err(RechargeError::SettlementConflict(format!(
                    "recharge {} already {}",
                    settlement.transaction_id, recharge.status
                )))
            }
            PaymentStatus::Pending => {}
        }
        recharge.complete(settlement.settled_at)?;

        let updated = sqlx::query(
            r#"
            UPDATE user_recharges
            SET payment_status = 'completed', settled_at = $2
            WHERE transaction_id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(*settlement.transaction_id.as_uuid())
        .bind(settlement.settled_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;
        if updated.rows_affected() != 1 {
            return Err(RechargeError::SettlementConflict(format!(
                "recharge {} changed during settlement",
                settlement.transaction_id
            )));
        }

        let reference = settlement.transaction_id.to_string();
        let mut wallet = lock_wallet(&mut tx, settlement.user_id, self.currency).await?;

        if let Some(debit) = settlement.wallet_debit.filter(Money::is_positive) {
            let (after, entry) =
                spend_reserved(&wallet, debit, WALLET_DEBIT_DESCRIPTION, Some(&reference))?;
            insert_wallet_entry(&mut tx, &entry).await?;
            wallet = after;
        }

        if let Some(schedule) = &settlement.schedule {
            let existing = schedule_rows(&mut tx, schedule.financing_id).await?;
            ensure_schedule_absent(schedule.financing_id, &existing)?;
            for installment in &schedule.installments {
                insert_installment(&mut tx, installment).await.map_err(|e| {
                    if e.is_unique_violation() {
                        RechargeError::DuplicateSchedule(schedule.financing_id)
                    } else {
                        e.into()
                    }
                })?;
            }
        }

        if let Some(cashback) = settlement.cashback {
            let ledger = credits_with_reference(&mut tx, settlement.user_id, &reference).await?;
            match credit_once(&wallet, &ledger, cashback, CASHBACK_DESCRIPTION, &reference)? {
                CreditOutcome::Applied { account, entry } => {
                    if insert_wallet_entry(&mut tx, &entry).await? {
                        wallet = account;
                    } else {
                        warn!("Cashback credit already recorded");
                    }
                }
                CreditOutcome::AlreadyCredited => debug!("Cashback already credited"),
            }
        }

        update_wallet(&mut tx, &wallet).await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        info!(balance = %wallet.balance, "Settlement committed");
        Ok(SettlementOutcome::Applied { recharge, wallet })
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn mark_failed(&self, transaction_id: TransactionId) -> Result<Recharge, RechargeError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let mut recharge = fetch_recharge(&mut tx, transaction_id, true)
            .await
            .map_err(|e| lookup_error("Recharge", e))?;
        if recharge.status != PaymentStatus::Pending {
            return Ok(recharge);
        }
        recharge.fail()?;

        sqlx::query(
            "UPDATE user_recharges SET payment_status = 'failed' WHERE transaction_id = $1 AND payment_status = 'pending'",
        )
        .bind(*transaction_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        if recharge.wallet_amount_used.is_positive() {
            let wallet = lock_wallet(&mut tx, recharge.user_id, self.currency).await?;
            let released = release(&wallet, recharge.wallet_amount_used)?;
            update_wallet(&mut tx, &released).await?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        info!(released = %recharge.wallet_amount_used, "Recharge failed");
        Ok(recharge)
    }

    async fn wallet(&self, user_id: UserId) -> Result<WalletAccount, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let wallet = lock_wallet(&mut tx, user_id, self.currency).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(wallet)
    }

    async fn wallet_transactions(&self, user_id: UserId) -> Result<Vec<WalletTransaction>, PortError> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            WALLET_TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, WalletTransactionRow>(&sql)
            .bind(*user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(convert_all(rows)?)
    }

    async fn installments(&self, user_id: UserId) -> Result<Vec<Installment>, PortError> {
        let sql = format!(
            "SELECT {} FROM emi_transactions WHERE user_id = $1 ORDER BY due_date, emi_number",
            INSTALLMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, InstallmentRow>(&sql)
            .bind(*user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(convert_all(rows)?)
    }

    async fn get_installment(&self, installment_id: InstallmentId) -> Result<Installment, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(fetch_installment(&mut conn, installment_id, false).await?)
    }

    /// A second pending attempt for the same installment trips
    /// `idx_emi_payments_open` and surfaces as `PortError::Conflict`
    #[instrument(skip(self, payment), fields(transaction_id = %payment.transaction_id))]
    async fn create_installment_payment(&self, payment: &InstallmentPayment) -> Result<(), PortError> {
        sqlx::query(
            r#"
            INSERT INTO emi_payments
                (transaction_id, emi_id, user_id, amount, currency, payment_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*payment.transaction_id.as_uuid())
        .bind(*payment.installment_id.as_uuid())
        .bind(*payment.user_id.as_uuid())
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().code())
        .bind(DbPaymentStatus::from(payment.status))
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn get_installment_payment(&self, transaction_id: TransactionId) -> Result<InstallmentPayment, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(fetch_installment_payment(&mut conn, transaction_id, false).await?)
    }

    async fn pending_installment_payment(
        &self,
        installment_id: InstallmentId,
    ) -> Result<Option<InstallmentPayment>, PortError> {
        let sql = format!(
            "SELECT {} FROM emi_payments WHERE emi_id = $1 AND payment_status = 'pending'",
            INSTALLMENT_PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, InstallmentPaymentRow>(&sql)
            .bind(*installment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.map(InstallmentPayment::try_from).transpose()?)
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn settle_installment_payment(
        &self,
        transaction_id: TransactionId,
        paid_at: DateTime<Utc>,
    ) -> Result<InstallmentSettlementOutcome, RechargeError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let mut payment = fetch_installment_payment(&mut tx, transaction_id, true)
            .await
            .map_err(|e| lookup_error("InstallmentPayment", e))?;
        let mut installment = fetch_installment(&mut tx, payment.installment_id, true)
            .await
            .map_err(|e| lookup_error("Installment", e))?;

        match payment.status {
            PaymentStatus::Completed => {
                return Ok(InstallmentSettlementOutcome::AlreadySettled { installment })
            }
            PaymentStatus::Failed | PaymentStatus::RefundDue => {
                return Err(RechargeError::SettlementConflict(format!(
                    "installment payment {} already {}",
                    transaction_id, payment.status
                )))
            }
            PaymentStatus::Pending => {}
        }

        if installment.is_paid() {
            sqlx::query(
                "UPDATE emi_payments SET payment_status = 'refund_due' WHERE transaction_id = $1 AND payment_status = 'pending'",
            )
            .bind(*transaction_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
            tx.commit().await.map_err(DatabaseError::from)?;

            warn!(installment_id = %installment.id, amount = %payment.amount, "Payment collected for an installment already paid");
            payment.status = PaymentStatus::RefundDue;
            return Ok(InstallmentSettlementOutcome::RefundDue { payment, installment });
        }

        installment.mark_paid(transaction_id, paid_at)?;

        sqlx::query(
            r#"
            UPDATE emi_transactions
            SET status = 'paid', paid_at = $2, transaction_id = $3
            WHERE emi_id = $1 AND status = 'pending'
            "#,
        )
        .bind(*installment.id.as_uuid())
        .bind(paid_at)
        .bind(*transaction_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query("UPDATE emi_payments SET payment_status = 'completed' WHERE transaction_id = $1")
            .bind(*transaction_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        info!(sequence = installment.sequence, "Installment paid");
        Ok(InstallmentSettlementOutcome::Paid { installment })
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn mark_installment_payment_failed(
        &self,
        transaction_id: TransactionId,
    ) -> Result<InstallmentPayment, RechargeError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        sqlx::query(
            "UPDATE emi_payments SET payment_status = 'failed' WHERE transaction_id = $1 AND payment_status = 'pending'",
        )
        .bind(*transaction_id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::from)?;

        fetch_installment_payment(&mut conn, transaction_id, false)
            .await
            .map_err(|e| lookup_error("InstallmentPayment", e))
    }
}
