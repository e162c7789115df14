//! # Database Error Types
//!
//! Error types for database operations and the checkout commit path.
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
//! │       ├── LedgerError   ← guarded stock apply (InsufficientStockAt     │
//! │       │                   Commit is distinct from the validator's      │
//! │       │                   pre-check failure)                           │
//! │       ├── CommitError   ← atomic sale commit (StockRaceLost)           │
//! │       └── CheckoutError ← the full pipeline result handed to the       │
//! │                           external caller                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The three caller-facing categories match the propagation policy:
//! rejections are client-correctable and write nothing, `StockRaceLost` is
//! recoverable by re-validating, and persistence failures are
//! fatal-for-this-attempt with a guaranteed rollback.

use thiserror::Error;

use tally_core::{RejectionReason, ValidationError};

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Replaying a ledger entry for the same (sale, product, cause)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
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
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
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
// LedgerError
// =============================================================================

/// Failures of the ledger's single mutating primitive, `apply`.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The guarded decrement affected zero rows: live stock could not cover
    /// the delta. Distinct from the validator's pre-check failure because
    /// it is evaluated against live state at write time.
    #[error("insufficient stock at commit for {product_id}: requested {requested}, available {available}")]
    InsufficientStockAtCommit {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// The targeted product row does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// Underlying store failure. A duplicate (sale, product, cause) entry
    /// surfaces here as a unique violation.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(err.into())
    }
}

// =============================================================================
// CommitError
// =============================================================================

/// Failures of the atomic sale commit. Either variant guarantees that no
/// partial Sale, SaleLines, or LedgerEntries survive.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A product's stock changed between validation and commit and the
    /// conditional decrement lost the race. Fully recoverable: re-validate
    /// against fresh state and retry.
    #[error("stock race lost for {product_id}: requested {requested}, available {available}")]
    StockRaceLost {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// The store itself failed mid-commit; the transaction rolled back.
    #[error(transparent)]
    Persistence(#[from] DbError),
}

impl From<sqlx::Error> for CommitError {
    fn from(err: sqlx::Error) -> Self {
        CommitError::Persistence(err.into())
    }
}

// =============================================================================
// CheckoutError
// =============================================================================

/// The full checkout pipeline result handed back to the external caller.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart failed validation; nothing was written. Client-correctable.
    #[error("cart rejected: {0}")]
    Rejected(#[from] RejectionReason),

    /// The commit failed after validation passed.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl From<DbError> for CheckoutError {
    fn from(err: DbError) -> Self {
        CheckoutError::Commit(CommitError::Persistence(err))
    }
}

// =============================================================================
// CatalogError
// =============================================================================

/// Failures of the catalog's admin-facing operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A field failed validation before anything touched the database.
    #[error("invalid product: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Db(err.into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_race_message_names_the_product() {
        let err = CommitError::StockRaceLost {
            product_id: "p1".to_string(),
            requested: 2,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "stock race lost for p1: requested 2, available 1"
        );
    }

    #[test]
    fn test_rejection_wraps_into_checkout_error() {
        let err: CheckoutError = RejectionReason::EmptyCart.into();
        assert!(matches!(err, CheckoutError::Rejected(_)));
        assert_eq!(err.to_string(), "cart rejected: cart is empty");
    }
}
