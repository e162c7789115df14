//! # Domain Types
//!
//! Core domain types for the checkout pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  LedgerEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  status         │   │  entry_type     │       │
//! │  │  price_cents    │   │  total_cents    │   │  delta (signed) │       │
//! │  │  current_stock  │   │  payment_method │   │  related_sale_id│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Transient (never persisted as-is):                                    │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    CartLine     │   │   CartPayload   │                             │
//! │  │  client prices  │   │  declared total │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Products have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `sku`: business identifier - human-readable, unique

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// Owned by the catalog; `current_stock` is mutated only through
/// ledger-mediated operations, never by ad hoc field updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Current selling price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Current stock level. Never negative.
    pub current_stock: i64,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Input for creating a catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// Opening stock; when positive, recorded as an `initial` ledger entry.
    pub initial_stock: i64,
}

// =============================================================================
// Cart Payload (caller-supplied, transient)
// =============================================================================

/// One line of a submitted cart, exactly as the client declared it.
///
/// Client-observed prices are carried so the validator can tell the caller
/// *what* went stale; the server-computed price is always the price of
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Unit price the client displayed, in major units (dollars).
    pub client_unit_price: f64,
    /// Line total the client computed, in major units (dollars).
    pub client_line_total: f64,
}

/// A complete checkout submission from the external caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartPayload {
    /// Ordered cart lines.
    pub lines: Vec<CartLine>,
    /// Grand total the client displayed, in major units (dollars).
    pub client_declared_total: f64,
    /// Optional customer reference (walk-in sales carry none).
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    /// Caller-supplied idempotency key. When present it becomes the sale
    /// id, so a retried submission resolves to the already-committed sale
    /// instead of a second decrement.
    pub idempotency_key: Option<String>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a committed sale.
///
/// There is no stored `failed` state: a commit that fails rolls back
/// completely, so the failure is a typed error returned to the caller, not
/// a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale committed successfully. Terminal for this subsystem.
    Completed,
    /// Sale cancelled after the fact (out-of-scope invoice workflow).
    Voided,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    /// Stable wire/database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "bank_transfer" | "transfer" => Ok(PaymentMethod::BankTransfer),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec![
                    "cash".to_string(),
                    "card".to_string(),
                    "bank_transfer".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Created exactly once per successful checkout; immutable afterwards
/// except for the void transition owned by the invoice workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub customer_id: Option<String>,
    /// Operator (cashier) who ran the checkout.
    pub user_id: String,
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
    /// Total after adjustments. Equal to `total_cents` until the
    /// out-of-scope discount/tax features land.
    pub final_cents: i64,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item in a committed sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Quantity sold.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// The cause of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Opening stock recorded at product creation.
    Initial,
    /// Depletion committed by a sale.
    Sale,
    /// Manual correction from the admin side.
    Adjustment,
}

impl EntryType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryType::Initial => "initial",
            EntryType::Sale => "sale",
            EntryType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record of a stock quantity change and its cause.
///
/// Append-only: entries are never updated or deleted. The sum of `delta`
/// over a product's entries equals that product's `current_stock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    pub id: String,
    pub product_id: String,
    pub entry_type: EntryType,
    /// Signed quantity change: negative for sales, positive for restocks.
    pub delta: i64,
    /// Sale this movement belongs to, when the cause is a sale.
    pub related_sale_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_round_trip() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::Card,
            PaymentMethod::BankTransfer,
        ] {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_payment_method_aliases() {
        assert_eq!("CASH".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("debit".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_entry_type_as_str() {
        assert_eq!(EntryType::Initial.as_str(), "initial");
        assert_eq!(EntryType::Sale.as_str(), "sale");
        assert_eq!(EntryType::Adjustment.as_str(), "adjustment");
    }

    #[test]
    fn test_product_price() {
        let now = Utc::now();
        let product = Product {
            id: "p1".to_string(),
            sku: "COKE-330".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            price_cents: 1000,
            current_stock: 5,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(product.price(), Money::from_cents(1000));
    }
}
