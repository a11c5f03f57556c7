//! PostgreSQL catalog and settings adapters
//!
//! Both are read-only. Plans and financing options are managed outside
//! this service.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, PlanId, PortError};
use domain_financing::{FinanceSettings, FinancingOption};
use domain_recharge::{CatalogPort, Plan, SettingsPort};

use crate::error::DatabaseError;
use crate::rows::{convert_all, FinanceSettingsRow, FinancingOptionRow, PlanRow};

#[derive(Debug, Clone)]
pub struct PostgresCatalogAdapter {
    pool: PgPool,
}

impl PostgresCatalogAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresCatalogAdapter {}

#[async_trait]
impl CatalogPort for PostgresCatalogAdapter {
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    async fn get_plan(&self, plan_id: PlanId) -> Result<Plan, PortError> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT plan_id, operator, name, amount, currency, validity_days,
                   is_multi_month, is_active
            FROM recharge_plans
            WHERE plan_id = $1
            "#,
        )
        .bind(*plan_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Plan", plan_id))?;

        Ok(Plan::try_from(row)?)
    }

    #[instrument(skip(self), fields(plan_id = %plan_id))]
    async fn financing_options(&self, plan_id: PlanId) -> Result<Vec<FinancingOption>, PortError> {
        let rows = sqlx::query_as::<_, FinancingOptionRow>(
            r#"
            SELECT option_id, plan_id, installment_count, processing_fee,
                   gst_percentage, is_active
            FROM financing_options
            WHERE plan_id = $1
            ORDER BY is_active DESC, option_id
            "#,
        )
        .bind(*plan_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        debug!(count = rows.len(), "Loaded financing options");
        Ok(convert_all(rows)?)
    }
}

/// Settings adapter; falls back to [`FinanceSettings::default`] when the
/// settings row has not been written
#[derive(Debug, Clone)]
pub struct PostgresSettingsAdapter {
    pool: PgPool,
}

impl PostgresSettingsAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresSettingsAdapter {}

#[async_trait]
impl SettingsPort for PostgresSettingsAdapter {
    #[instrument(skip(self))]
    async fn finance_settings(&self) -> Result<FinanceSettings, PortError> {
        let row = sqlx::query_as::<_, FinanceSettingsRow>(
            r#"
            SELECT cashback_amount, currency, processing_fee, gst_percentage,
                   installment_count, period_multiplier
            FROM finance_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        match row {
            Some(row) => Ok(FinanceSettings::try_from(row)?),
            None => {
                debug!("No finance settings stored, using defaults");
                Ok(FinanceSettings::default())
            }
        }
    }
}
