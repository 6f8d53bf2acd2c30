//! # Database Error Types
//!
//! Error types for database operations and for the checkout transaction.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├──► CheckoutError::PersistenceFailure (inside checkout)         │
//! │       ▼                                                                 │
//! │  ApiError (in the CLI) ← Message + exit code                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use mercado_core::{SessionError, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering a CPF that already exists
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint or trigger rejected the write.
    ///
    /// ## When This Occurs
    /// - Stock would go negative
    /// - Order item with quantity 0
    /// - Attempt to change a customer's CPF
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Product cannot be deleted because an order item references it.
    #[error("Product {0} is referenced by existing orders")]
    ReferencedByOrder(String),

    /// Customer cannot be deleted because they own orders.
    #[error("Customer {0} has orders")]
    HasOrders(String),

    /// CPF/password pair did not match a customer.
    #[error("Invalid CPF or password")]
    InvalidCredentials,

    /// A conditional update found the row changed since it was read.
    #[error("Concurrent update conflict on {entity} {id}")]
    Conflict { entity: String, id: String },

    /// Input rejected before reaching SQL.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.split("UNIQUE constraint failed: ").nth(1) {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") || msg.contains("immutable") {
                    DbError::ConstraintViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Checkout Errors
// =============================================================================

/// Why a checkout did not produce an order.
///
/// Every variant leaves the database and the cart exactly as they were.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The session has no logged-in customer.
    #[error("Login required to check out")]
    NotAuthenticated,

    /// Cart empty, or every line referred to a product that no longer exists.
    #[error("Cart is empty")]
    EmptyCart,

    /// The session's customer no longer exists.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Profile lacks fields needed for delivery.
    #[error("Profile incomplete, missing: {}", missing.join(", "))]
    IncompleteProfile { missing: Vec<String> },

    /// Strict policy met a short line.
    ///
    /// ## When This Occurs
    /// ```text
    /// policy = strict, cart {Feijão: 5}, stock 2
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Feijão", requested: 5, available: 2 }
    /// ```
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// Backorder policy, but nothing at all could be sold.
    #[error("Out of stock: {}", products.join(", "))]
    OutOfStock { products: Vec<String> },

    /// Malformed direct-order input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session store failed before or after the transaction.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Any store error during the transaction. Everything was rolled back.
    #[error("Could not save order: {0}")]
    PersistenceFailure(#[from] DbError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        CheckoutError::PersistenceFailure(err.into())
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DbError::not_found("Product", "p1").to_string(),
            "Product not found: p1"
        );
        assert_eq!(
            CheckoutError::IncompleteProfile {
                missing: vec!["cep".into(), "city".into()]
            }
            .to_string(),
            "Profile incomplete, missing: cep, city"
        );
        assert_eq!(
            CheckoutError::InsufficientStock {
                product: "Feijão".into(),
                requested: 5,
                available: 2
            }
            .to_string(),
            "Insufficient stock for Feijão: requested 5, available 2"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err: CheckoutError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(
            err,
            CheckoutError::PersistenceFailure(DbError::PoolExhausted)
        ));
    }
}
