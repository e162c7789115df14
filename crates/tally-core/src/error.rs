//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── RejectionReason  - Cart validation failures (client-correctable,  │
//! │  │                      no writes were attempted)                      │
//! │  └── ValidationError  - Field-level input validation failures          │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  ├── LedgerError      - Guarded stock apply failures                   │
//! │  └── CommitError      - Atomic sale commit failures                    │
//! │                                                                         │
//! │  Flow: RejectionReason / CommitError → caller decides: retry,          │
//! │  re-prompt the operator, or surface a hard failure                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, expected vs. actual)
//! 3. Errors are enum variants, never String
//! 4. Line-level issues are collected per category, never reported one at
//!    a time

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Cart Rejection
// =============================================================================

/// A client price that no longer matches the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub product_id: String,
    pub sku: String,
    /// Unit price the client observed, in major units.
    pub client_price: f64,
    /// Current catalog price, in major units.
    pub current_price: f64,
}

/// A cart line whose quantity is not a usable positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityIssue {
    pub product_id: String,
    pub quantity: i64,
}

/// A requested quantity the snapshot stock cannot cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub product_id: String,
    pub sku: String,
    pub requested: i64,
    pub available: i64,
}

/// Why a submitted cart was rejected before any write was attempted.
///
/// The validator short-circuits on the first failing *category* but
/// collects every offending line within it, so the operator can fix the
/// whole cart in one pass.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Cart contained no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Cart exceeded the per-transaction line cap.
    #[error("cart has {count} lines, maximum is {max}")]
    TooManyLines { count: usize, max: usize },

    /// One or more quantities were zero, negative, or above the per-line cap.
    #[error("invalid quantity on {} line(s)", .lines.len())]
    InvalidQuantity { lines: Vec<QuantityIssue> },

    /// One or more product ids do not exist in the catalog.
    #[error("unknown product(s): {ids:?}")]
    UnknownProduct { ids: Vec<String> },

    /// Client-declared grand total disagrees with the server-computed one.
    #[error("cart total mismatch: client declared {declared:.2}, server computed {computed:.2}")]
    TotalMismatch { declared: f64, computed: f64 },

    /// One or more catalog prices changed since the client loaded them.
    /// The caller should re-prompt rather than silently charge the new price.
    #[error("price changed for {} product(s)", .changes.len())]
    PriceChanged { changes: Vec<PriceChange> },

    /// Snapshot stock cannot cover one or more lines. Pre-check only; the
    /// authoritative guard re-runs inside the commit transaction.
    #[error("insufficient stock for {} product(s)", .shortages.len())]
    InsufficientStock { shortages: Vec<StockShortage> },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level input validation errors.
///
/// These occur when a single input value doesn't meet requirements, e.g.
/// on the catalog's admin surface. Cart-level problems use
/// [`RejectionReason`] instead.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad characters in a SKU).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        let err = RejectionReason::TotalMismatch {
            declared: 19.99,
            computed: 20.0,
        };
        assert_eq!(
            err.to_string(),
            "cart total mismatch: client declared 19.99, server computed 20.00"
        );

        let err = RejectionReason::UnknownProduct {
            ids: vec!["p-404".to_string()],
        };
        assert!(err.to_string().contains("p-404"));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }
}
