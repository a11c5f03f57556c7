//! PostgreSQL identity adapter
//!
//! Reads the verified phone number from `profiles`. Users without a
//! profile row are treated the same as users without a verified number.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, PhoneNumber, PortError, UserId};
use domain_recharge::IdentityPort;

use crate::error::DatabaseError;
use crate::rows::ProfileRow;

#[derive(Debug, Clone)]
pub struct PostgresIdentityAdapter {
    pool: PgPool,
}

impl PostgresIdentityAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresIdentityAdapter {}

#[async_trait]
impl IdentityPort for PostgresIdentityAdapter {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn verified_phone(&self, user_id: UserId) -> Result<Option<PhoneNumber>, PortError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, phone_number, phone_verified FROM profiles WHERE user_id = $1",
        )
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let Some(row) = row else {
            debug!("No profile on file");
            return Ok(None);
        };
        Ok(row.verified_phone()?)
    }
}
