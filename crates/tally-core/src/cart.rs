//! # Cart Validator
//!
//! Cross-checks a submitted cart against catalog snapshots and produces
//! either a server-priced [`ValidatedOrder`] or a structured
//! [`RejectionReason`].
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Check Categories (in order)                        │
//! │                                                                         │
//! │  1. Shape        cart non-empty, ≤ MAX_CART_LINES lines, every         │
//! │                  quantity a positive integer within the per-line cap   │
//! │  2. Existence    every product id present in the snapshot              │
//! │  3. Total        declared total == Σ qty × current price (±0.001)      │
//! │  4. Price        client unit price == catalog price (±0.001)           │
//! │  5. Stock        quantity ≤ snapshot stock (PRE-CHECK ONLY)            │
//! │                                                                         │
//! │  Short-circuit on the first failing CATEGORY, but collect every        │
//! │  offending line within it, so one rejection fixes the whole cart.      │
//! │                                                                         │
//! │  The stock check here reads a snapshot that may already be stale.      │
//! │  That is intentional: the authoritative guard re-runs against live     │
//! │  state inside the commit transaction (tally-db).                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No side effects; purely read + compute. Concurrent calls are
//! independent and require no coordination.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PriceChange, QuantityIssue, RejectionReason, StockShortage};
use crate::money::Money;
use crate::types::{CartLine, Product};
use crate::validation::validate_quantity;
use crate::MAX_CART_LINES;

// =============================================================================
// Validated Order
// =============================================================================

/// One cart line after validation, annotated with the server-trusted price
/// and the stock level observed during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    /// Server price of record at validation time.
    pub unit_price: Money,
    /// `quantity × unit_price`, computed server-side.
    pub line_total: Money,
    /// Stock level seen in the snapshot. Informational only; the commit
    /// guard re-checks live state.
    pub stock_snapshot: i64,
}

/// A cart that passed validation: lines re-priced from the catalog, total
/// recomputed server-side. The only input the coordinator accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedOrder {
    pub lines: Vec<ValidatedLine>,
    pub total: Money,
}

impl ValidatedOrder {
    /// Number of distinct lines in the order.
    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a submitted cart against a catalog snapshot.
///
/// ## Arguments
/// * `lines` - Caller-supplied cart lines, in submission order
/// * `declared_total` - Grand total the client displayed (major units)
/// * `snapshot` - Products fetched for the cart's ids, keyed by id.
///   Ids absent from the map are treated as unknown products.
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use chrono::Utc;
/// use tally_core::{validate_cart, CartLine, Product};
///
/// let now = Utc::now();
/// let product = Product {
///     id: "p1".to_string(),
///     sku: "COKE-330".to_string(),
///     name: "Coca-Cola 330ml".to_string(),
///     price_cents: 1000,
///     current_stock: 5,
///     created_at: now,
///     updated_at: now,
/// };
/// let snapshot = HashMap::from([(product.id.clone(), product)]);
/// let lines = vec![CartLine {
///     product_id: "p1".to_string(),
///     quantity: 2,
///     client_unit_price: 10.0,
///     client_line_total: 20.0,
/// }];
///
/// let order = validate_cart(&lines, 20.0, &snapshot).unwrap();
/// assert_eq!(order.total.cents(), 2000);
/// ```
pub fn validate_cart(
    lines: &[CartLine],
    declared_total: f64,
    snapshot: &HashMap<String, Product>,
) -> Result<ValidatedOrder, RejectionReason> {
    // Category 1: shape
    if lines.is_empty() {
        return Err(RejectionReason::EmptyCart);
    }

    if lines.len() > MAX_CART_LINES {
        return Err(RejectionReason::TooManyLines {
            count: lines.len(),
            max: MAX_CART_LINES,
        });
    }

    let bad_quantities: Vec<QuantityIssue> = lines
        .iter()
        .filter(|l| validate_quantity(l.quantity).is_err())
        .map(|l| QuantityIssue {
            product_id: l.product_id.clone(),
            quantity: l.quantity,
        })
        .collect();
    if !bad_quantities.is_empty() {
        return Err(RejectionReason::InvalidQuantity {
            lines: bad_quantities,
        });
    }

    // Category 2: existence
    let unknown: Vec<String> = lines
        .iter()
        .filter(|l| !snapshot.contains_key(&l.product_id))
        .map(|l| l.product_id.clone())
        .collect();
    if !unknown.is_empty() {
        return Err(RejectionReason::UnknownProduct { ids: unknown });
    }

    // Category 3: declared total vs. server-computed total.
    // The server recomputes quantity × current price; the client's own
    // line totals are never trusted.
    let computed: Money = lines
        .iter()
        .map(|l| snapshot[&l.product_id].price().multiply_quantity(l.quantity))
        .fold(Money::zero(), |acc, m| acc.saturating_add(m));
    if !computed.approx_eq(declared_total) {
        return Err(RejectionReason::TotalMismatch {
            declared: declared_total,
            computed: computed.as_major_units(),
        });
    }

    // Category 4: stale client prices. Even with a matching grand total,
    // a per-line drift means the operator is looking at outdated prices
    // and should re-prompt.
    let changes: Vec<PriceChange> = lines
        .iter()
        .filter(|l| !snapshot[&l.product_id].price().approx_eq(l.client_unit_price))
        .map(|l| {
            let product = &snapshot[&l.product_id];
            PriceChange {
                product_id: product.id.clone(),
                sku: product.sku.clone(),
                client_price: l.client_unit_price,
                current_price: product.price().as_major_units(),
            }
        })
        .collect();
    if !changes.is_empty() {
        return Err(RejectionReason::PriceChanged { changes });
    }

    // Category 5: snapshot stock pre-check
    let shortages: Vec<StockShortage> = lines
        .iter()
        .filter(|l| l.quantity > snapshot[&l.product_id].current_stock)
        .map(|l| {
            let product = &snapshot[&l.product_id];
            StockShortage {
                product_id: product.id.clone(),
                sku: product.sku.clone(),
                requested: l.quantity,
                available: product.current_stock,
            }
        })
        .collect();
    if !shortages.is_empty() {
        return Err(RejectionReason::InsufficientStock { shortages });
    }

    // All categories passed: annotate lines with server-trusted prices.
    let validated: Vec<ValidatedLine> = lines
        .iter()
        .map(|l| {
            let product = &snapshot[&l.product_id];
            let unit_price = product.price();
            ValidatedLine {
                product_id: product.id.clone(),
                sku: product.sku.clone(),
                name: product.name.clone(),
                quantity: l.quantity,
                unit_price,
                line_total: unit_price.multiply_quantity(l.quantity),
                stock_snapshot: product.current_stock,
            }
        })
        .collect();
    let total = validated
        .iter()
        .map(|l| l.line_total)
        .fold(Money::zero(), |acc, m| acc.saturating_add(m));

    Ok(ValidatedOrder {
        lines: validated,
        total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
