//! Custom error types for the common library
//!
//! This module defines the storage error type shared by every service.
//! Repositories return [`DatabaseResult`] so that callers can tell an
//! integrity violation (which is the caller's fault) apart from a broken
//! connection (which is not).

use sqlx::Error as SqlxError;
use thiserror::Error;

/// SQLSTATE raised by PostgreSQL for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE raised for foreign key violations
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE raised for check constraint violations
const CHECK_VIOLATION: &str = "23514";
/// SQLSTATE raised when a value overflows its column type
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Constraint reported for values that overflow their column type
pub const OUT_OF_RANGE: &str = "numeric_value_out_of_range";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A foreign key or check constraint rejected the write
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DatabaseError {
    /// Classify a query error, turning integrity violations into
    /// [`DatabaseError::Conflict`] or [`DatabaseError::Constraint`].
    pub fn from_query(err: SqlxError) -> Self {
        let classified = err.as_database_error().and_then(|db_err| {
            let message = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => Some(DatabaseError::Conflict(message)),
                Some(FOREIGN_KEY_VIOLATION) | Some(CHECK_VIOLATION) => {
                    Some(DatabaseError::Constraint(message))
                }
                Some(NUMERIC_VALUE_OUT_OF_RANGE) => {
                    Some(DatabaseError::Constraint(OUT_OF_RANGE.to_string()))
                }
                _ => None,
            }
        });

        classified.unwrap_or(DatabaseError::Query(err))
    }

    /// True when the error was caused by a unique constraint
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    /// True when a value did not fit its column
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, DatabaseError::Constraint(constraint) if constraint == OUT_OF_RANGE)
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        DatabaseError::from_query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_stays_a_query_error() {
        let err = DatabaseError::from_query(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(SqlxError::RowNotFound)));
        assert!(!err.is_conflict());
    }

    #[test]
    fn conflict_message_is_displayed() {
        let err = DatabaseError::Conflict("products_sku_key".to_string());
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Conflict: products_sku_key");
    }

    #[test]
    fn out_of_range_is_a_constraint_but_not_any_constraint() {
        let overflow = DatabaseError::Constraint(OUT_OF_RANGE.to_string());
        assert!(overflow.is_out_of_range());
        assert!(!overflow.is_conflict());

        let fk = DatabaseError::Constraint("cart_items_product_id_fkey".to_string());
        assert!(!fk.is_out_of_range());
    }
}
