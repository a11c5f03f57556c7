//! Database error types
//!
//! SQLx failures are classified by PostgreSQL error code so callers can
//! tell a unique-index hit from a lost connection. Adapters hand errors to
//! the domain as [`PortError`] or [`RechargeError`].

use thiserror::Error;

use core_kernel::PortError;
use domain_recharge::RechargeError;

/// PostgreSQL error codes
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
mod pg_codes {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure or deadlock; the transaction can be retried
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped to a domain value
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn serialization(message: impl std::fmt::Display) -> Self {
        DatabaseError::SerializationError(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::DuplicateEntry(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "Record",
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::SerializationError(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some(pg_codes::UNIQUE_VIOLATION) => DatabaseError::DuplicateEntry(message),
                    Some(pg_codes::FOREIGN_KEY_VIOLATION) => {
                        DatabaseError::ForeignKeyViolation(message)
                    }
                    Some(pg_codes::CHECK_VIOLATION) => DatabaseError::ConstraintViolation(message),
                    Some(pg_codes::SERIALIZATION_FAILURE) | Some(pg_codes::DEADLOCK_DETECTED) => {
                        DatabaseError::TransactionFailed(message)
                    }
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
            DatabaseError::DuplicateEntry(msg) => PortError::conflict(msg),
            DatabaseError::ForeignKeyViolation(msg) | DatabaseError::ConstraintViolation(msg) => {
                PortError::validation(msg)
            }
            DatabaseError::ConnectionFailed(msg) => PortError::connection(msg),
            DatabaseError::PoolExhausted => PortError::ServiceUnavailable {
                service: "postgres".to_string(),
            },
            DatabaseError::TransactionFailed(msg) => PortError::connection(msg),
            DatabaseError::SerializationError(msg) => PortError::transformation(msg),
            other => PortError::internal(other.to_string()),
        }
    }
}

impl From<DatabaseError> for RechargeError {
    fn from(error: DatabaseError) -> Self {
        RechargeError::Storage(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(error.is_not_found());
        assert!(PortError::from(error).is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let error = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(error.is_connection_error());
        assert!(PortError::from(error).is_transient());
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let error = DatabaseError::DuplicateEntry("idx_user_recharges_transaction".into());
        assert!(error.is_unique_violation());
        assert!(error.is_constraint_violation());
        assert!(PortError::from(error).is_conflict());
    }

    #[test]
    fn test_not_found_message() {
        let error = DatabaseError::not_found("Recharge", "TXN-1");
        assert_eq!(error.to_string(), "Recharge with id 'TXN-1' not found");
    }

    #[test]
    fn test_serialization_error_is_transformation() {
        let port = PortError::from(DatabaseError::serialization("bad currency"));
        assert!(matches!(port, PortError::Transformation { .. }));
    }

    #[test]
    fn test_recharge_error_wraps_storage() {
        let error = RechargeError::from(DatabaseError::ConnectionFailed("reset".into()));
        assert!(matches!(error, RechargeError::Storage(_)));
        assert!(error.is_retryable());
    }
}
