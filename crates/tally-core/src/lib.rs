//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate is the **heart** of the checkout pipeline. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tally POS Checkout Flow                           │
//! │                                                                         │
//! │  External caller (HTTP/form layer, out of scope)                       │
//! │       │ CartPayload                                                     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ validator │  │   rules   │  │   │
//! │  │   │   Sale    │  │  epsilon  │  │ Validated │  │  checks   │  │   │
//! │  │   │  Ledger   │  │  compare  │  │   Order   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │ ValidatedOrder                                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │     inventory ledger, sale coordinator, SQLite transactions     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleLine, LedgerEntry, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - The cart validator: snapshot in, `ValidatedOrder` or a
//!   typed rejection out
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64); floats exist
//!    only at the client boundary and are compared with [`CURRENCY_EPSILON`]
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use cart::{validate_cart, ValidatedLine, ValidatedOrder};
pub use error::{PriceChange, QuantityIssue, RejectionReason, StockShortage, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tolerance for comparing client-supplied float amounts against
/// server-computed cents, in major currency units (dollars).
///
/// ## Why an epsilon at all?
/// The system stores integer cents and never does float math internally,
/// but cart payloads arrive from a browser where `0.1 + 0.2` is already
/// wrong. Client totals and unit prices are therefore compared within
/// 0.001 rather than exactly.
pub const CURRENCY_EPSILON: f64 = 0.001;

/// Maximum distinct lines allowed in a single cart
///
/// ## Business Reason
/// Prevents runaway carts and ensures reasonable transaction sizes.
pub const MAX_CART_LINES: usize = 100;

/// Maximum catalog price, in cents ($1,000,000.00)
///
/// ## Business Reason
/// No single POS line item costs a million dollars; the bound also keeps
/// every line total and cart total far inside i64 range
/// (MAX_PRICE_CENTS × MAX_LINE_QUANTITY × MAX_CART_LINES ≈ 10^13).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Maximum quantity of a single line in a cart
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_LINE_QUANTITY: i64 = 999;
