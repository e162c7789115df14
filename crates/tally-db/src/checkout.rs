//! # Sale Coordinator
//!
//! Drives a validated cart through the atomic commit: one SQLite
//! transaction that writes the sale header, the snapshot line items, and
//! one guarded ledger decrement per line. If any line loses the stock race
//! the whole transaction rolls back and the caller gets a typed
//! [`CommitError::StockRaceLost`]; there is no partially-committed sale.
//!
//! ## Commit Pipeline
//! ```text
//!  CartPayload
//!      │  snapshot products (read-only)
//!      ▼
//!  validate_cart ──── rejected ──► CheckoutError::Rejected
//!      │ ValidatedOrder
//!      ▼
//!  BEGIN ─► INSERT sale ─► per line (ascending product_id):
//!              INSERT sale_line
//!              guarded UPDATE stock  ── 0 rows ──► ROLLBACK, StockRaceLost
//!              INSERT ledger entry
//!          COMMIT ─► CheckoutReceipt
//! ```
//!
//! ## Idempotency
//! A caller-supplied idempotency key becomes the sale id. A replayed
//! commit finds the existing sale row and returns its receipt without
//! touching stock; the partial unique index on the ledger backs this up
//! at the schema level.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CheckoutError, CommitError, DbError, LedgerError};
use crate::repository::catalog::CatalogRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::sale::SaleRepository;
use tally_core::{
    validate_cart, CartPayload, EntryType, Money, PaymentMethod, Sale, SaleStatus, ValidatedOrder,
};

/// A validated order plus the commit-time facts the cart payload carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub order: ValidatedOrder,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    /// Operator (cashier) running the checkout.
    pub user_id: String,
    /// Becomes the sale id when present; see module docs.
    pub idempotency_key: Option<String>,
}

/// What the caller gets back from a successful commit. Serializable as-is
/// for the JSON-speaking caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub sale_id: String,
    pub total: Money,
    /// Distinct lines on the sale.
    pub line_count: usize,
    /// Total units across all lines.
    pub unit_count: i64,
}

/// Coordinates validation and the atomic sale commit.
#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    pool: SqlitePool,
}

impl SaleCoordinator {
    /// Creates a new SaleCoordinator.
    pub fn new(pool: SqlitePool) -> Self {
        SaleCoordinator { pool }
    }

    /// Runs the full pipeline: snapshot, validate, commit.
    ///
    /// ## Errors
    /// * [`CheckoutError::Rejected`] - the cart failed validation; the
    ///   variant carries every issue in its category
    /// * [`CheckoutError::Commit`] - validation passed but the commit
    ///   failed (stock race lost, or a persistence error)
    pub async fn checkout(
        &self,
        payload: &CartPayload,
        user_id: &str,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let mut ids: Vec<String> = payload
            .lines
            .iter()
            .map(|l| l.product_id.clone())
            .collect();
        ids.sort();
        ids.dedup();

        let snapshot = CatalogRepository::new(self.pool.clone())
            .snapshot(&ids)
            .await?;

        let order = validate_cart(&payload.lines, payload.client_declared_total, &snapshot)
            .map_err(|reason| {
                warn!(reason = %reason, lines = payload.lines.len(), "Cart rejected");
                reason
            })?;

        let receipt = self
            .commit(CommitRequest {
                order,
                payment_method: payload.payment_method,
                customer_id: payload.customer_id.clone(),
                user_id: user_id.to_string(),
                idempotency_key: payload.idempotency_key.clone(),
            })
            .await?;

        Ok(receipt)
    }

    /// Atomically commits a validated order.
    ///
    /// Every write happens in one transaction. Lines are processed in
    /// ascending product id order so two concurrent commits touching the
    /// same products contend in the same sequence.
    pub async fn commit(&self, request: CommitRequest) -> Result<CheckoutReceipt, CommitError> {
        let sale_id = request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Replay check: a retried submission resolves to the sale the
        // first attempt committed.
        if let Some(existing) = SaleRepository::new(self.pool.clone())
            .get_by_id(&sale_id)
            .await
            .map_err(CommitError::Persistence)?
        {
            info!(sale_id = %sale_id, "Idempotent replay, returning existing sale");
            return self.replay_receipt(existing).await;
        }

        let mut lines = request.order.lines.clone();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let sale = Sale {
            id: sale_id.clone(),
            customer_id: request.customer_id,
            user_id: request.user_id,
            payment_method: request.payment_method,
            total_cents: request.order.total.cents(),
            final_cents: request.order.total.cents(),
            status: SaleStatus::Completed,
            created_at: Utc::now(),
        };

        debug!(sale_id = %sale_id, lines = lines.len(), total = %request.order.total, "Committing sale");

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        SaleRepository::insert_sale_in(&mut tx, &sale)
            .await
            .map_err(CommitError::Persistence)?;

        for line in &lines {
            SaleRepository::insert_line_in(&mut tx, &sale_id, line)
                .await
                .map_err(CommitError::Persistence)?;
        }

        // One ledger entry per product, aggregated across lines. BTreeMap
        // keeps product ids ascending, which is the contention order.
        let mut deltas: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &lines {
            *deltas.entry(line.product_id.as_str()).or_insert(0) -= line.quantity;
        }

        for (product_id, delta) in deltas {
            // Guarded decrement. A zero-row update means live stock moved
            // since validation; dropping the transaction rolls back the
            // header and every line.
            LedgerRepository::apply_in(
                &mut tx,
                product_id,
                delta,
                EntryType::Sale,
                Some(&sale_id),
                None,
            )
            .await
            .map_err(|e| match e {
                LedgerError::InsufficientStockAtCommit {
                    product_id,
                    requested,
                    available,
                } => {
                    warn!(sale_id = %sale_id, product_id = %product_id, requested, available, "Stock race lost, rolling back");
                    CommitError::StockRaceLost {
                        product_id,
                        requested,
                        available,
                    }
                }
                LedgerError::ProductNotFound(id) => {
                    CommitError::Persistence(DbError::not_found("Product", &id))
                }
                LedgerError::Db(db) => CommitError::Persistence(db),
            })?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_id = %sale_id,
            total = %request.order.total,
            lines = lines.len(),
            "Sale committed"
        );

        Ok(CheckoutReceipt {
            sale_id,
            total: request.order.total,
            line_count: request.order.line_count(),
            unit_count: request.order.unit_count(),
        })
    }

    /// Rebuilds a receipt for an already-committed sale.
    async fn replay_receipt(&self, sale: Sale) -> Result<CheckoutReceipt, CommitError> {
        let lines = SaleRepository::new(self.pool.clone())
            .get_lines(&sale.id)
            .await
            .map_err(CommitError::Persistence)?;

        Ok(CheckoutReceipt {
            sale_id: sale.id,
            total: Money::from_cents(sale.total_cents),
            line_count: lines.len(),
            unit_count: lines.iter().map(|l| l.quantity).sum(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::{CartLine, NewProduct, Product, RejectionReason};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        db.catalog()
            .create(&NewProduct {
                sku: sku.to_string(),
                name: format!("{sku} (test)"),
                price_cents,
                initial_stock: stock,
            })
            .await
            .unwrap()
    }

    fn line(product: &Product, quantity: i64) -> CartLine {
        CartLine {
            product_id: product.id.clone(),
            quantity,
            client_unit_price: product.price_cents as f64 / 100.0,
            client_line_total: (product.price_cents * quantity) as f64 / 100.0,
        }
    }

    fn payload(lines: Vec<CartLine>, declared_total: f64) -> CartPayload {
        CartPayload {
            lines,
            client_declared_total: declared_total,
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_happy_path() {
        let db = test_db().await;
        let coke = seed_product(&db, "COKE-330", 250, 10).await;
        let chips = seed_product(&db, "CHIPS-50", 150, 4).await;

        // 2 x 2.50 + 3 x 1.50 = 9.50
        let receipt = db
            .checkout()
            .checkout(
                &payload(vec![line(&coke, 2), line(&chips, 3)], 9.50),
                "cashier-1",
            )
            .await
            .unwrap();

        assert_eq!(receipt.total, Money::from_cents(950));
        assert_eq!(receipt.line_count, 2);
        assert_eq!(receipt.unit_count, 5);

        // Stock moved and the ledger agrees with the product rows.
        let coke_after = db.catalog().get_by_id(&coke.id).await.unwrap().unwrap();
        let chips_after = db.catalog().get_by_id(&chips.id).await.unwrap().unwrap();
        assert_eq!(coke_after.current_stock, 8);
        assert_eq!(chips_after.current_stock, 1);
        assert_eq!(db.ledger().reconstructed_stock(&coke.id).await.unwrap(), 8);
        assert_eq!(db.ledger().reconstructed_stock(&chips.id).await.unwrap(), 1);

        // Sale header and snapshot lines persisted.
        let sale = db
            .sales()
            .get_by_id(&receipt.sale_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sale.total_cents, 950);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.user_id, "cashier-1");

        let lines = db.sales().get_lines(&receipt.sale_id).await.unwrap();
        assert_eq!(lines.len(), 2);
        let coke_line = lines.iter().find(|l| l.product_id == coke.id).unwrap();
        assert_eq!(coke_line.sku_snapshot, "COKE-330");
        assert_eq!(coke_line.unit_price_cents, 250);
        assert_eq!(coke_line.line_total_cents, 500);

        // Each line produced exactly one sale ledger entry.
        let entries = db.ledger().entries_for_sale(&receipt.sale_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.entry_type == EntryType::Sale && e.delta < 0));
    }

    #[tokio::test]
    async fn test_checkout_rejected_cart_writes_nothing() {
        let db = test_db().await;
        let coke = seed_product(&db, "COKE-330", 250, 10).await;

        let mut bad = payload(vec![line(&coke, 2)], 5.00);
        bad.lines[0].product_id = "ghost".to_string();

        let err = db.checkout().checkout(&bad, "cashier-1").await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(RejectionReason::UnknownProduct { .. })
        ));

        let after = db.catalog().get_by_id(&coke.id).await.unwrap().unwrap();
        assert_eq!(after.current_stock, 10);
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_price_change_rejected() {
        let db = test_db().await;
        let coke = seed_product(&db, "COKE-330", 250, 10).await;

        // Cart built against the old price; declared total matches the
        // client's stale math so the mismatch is attributed to the price.
        let stale = payload(vec![line(&coke, 2)], 5.00);
        db.catalog().update_price(&coke.id, 300).await.unwrap();

        let err = db
            .checkout()
            .checkout(&stale, "cashier-1")
            .await
            .unwrap_err();
        match err {
            CheckoutError::Rejected(RejectionReason::PriceChanged { changes }) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].current_price, 3.00);
            }
            other => panic!("expected PriceChanged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stock_race_rolls_back_everything() {
        let db = test_db().await;
        let a = seed_product(&db, "A-1", 100, 5).await;
        let b = seed_product(&db, "B-1", 100, 1).await;

        // Validate while both lines are coverable.
        let p = payload(vec![line(&a, 2), line(&b, 1)], 3.00);

        // Another actor drains B between validation and commit.
        db.catalog().adjust_stock(&b.id, -1, Some("shrinkage")).await.unwrap();

        let err = db.checkout().checkout(&p, "cashier-1").await.unwrap_err();

        // Validation re-snapshots, so the drain is caught there; force the
        // commit path instead by validating manually first.
        assert!(matches!(
            err,
            CheckoutError::Rejected(RejectionReason::InsufficientStock { .. })
        ));

        // Now the true race: validate from a snapshot, drain, then commit.
        db.catalog().adjust_stock(&b.id, 1, Some("recount")).await.unwrap();
        let snapshot = db
            .catalog()
            .snapshot(&[a.id.clone(), b.id.clone()])
            .await
            .unwrap();
        let order = validate_cart(&p.lines, p.client_declared_total, &snapshot).unwrap();
        db.catalog().adjust_stock(&b.id, -1, Some("shrinkage")).await.unwrap();

        let err = db
            .checkout()
            .commit(CommitRequest {
                order,
                payment_method: PaymentMethod::Cash,
                customer_id: None,
                user_id: "cashier-1".to_string(),
                idempotency_key: None,
            })
            .await
            .unwrap_err();

        match err {
            CommitError::StockRaceLost {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, b.id);
                assert_eq!(requested, 1);
                assert_eq!(available, 0);
            }
            other => panic!("expected StockRaceLost, got {other:?}"),
        }

        // No sale, no lines, no sale ledger entries, A untouched.
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
        let a_after = db.catalog().get_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(a_after.current_stock, 5);
        let a_entries = db.ledger().entries_for_product(&a.id).await.unwrap();
        assert!(a_entries.iter().all(|e| e.entry_type != EntryType::Sale));
    }

    #[tokio::test]
    async fn test_concurrent_commits_one_wins() {
        let db = test_db().await;
        let item = seed_product(&db, "HOT-1", 100, 5).await;

        // Both orders validated from the same snapshot; together they
        // overdraw the 5 in stock.
        let snapshot = db.catalog().snapshot(&[item.id.clone()]).await.unwrap();
        let lines = vec![line(&item, 3)];
        let order_a = validate_cart(&lines, 3.00, &snapshot).unwrap();
        let order_b = validate_cart(&lines, 3.00, &snapshot).unwrap();

        let request = |order: ValidatedOrder| CommitRequest {
            order,
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            user_id: "cashier-1".to_string(),
            idempotency_key: None,
        };

        let coordinator = db.checkout();
        let (first, second) = tokio::join!(
            coordinator.commit(request(order_a)),
            coordinator.commit(request(order_b)),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser.as_ref().unwrap_err(),
            CommitError::StockRaceLost { .. }
        ));

        // Exactly one decrement landed.
        let after = db.catalog().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(after.current_stock, 2);
        assert_eq!(db.ledger().reconstructed_stock(&item.id).await.unwrap(), 2);
        assert_eq!(db.sales().list_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_replay_decrements_once() {
        let db = test_db().await;
        let item = seed_product(&db, "RPL-1", 200, 10).await;

        let mut p = payload(vec![line(&item, 4)], 8.00);
        p.idempotency_key = Some("sale-retry-7f3a".to_string());

        let first = db.checkout().checkout(&p, "cashier-1").await.unwrap();
        let second = db.checkout().checkout(&p, "cashier-1").await.unwrap();

        assert_eq!(first.sale_id, "sale-retry-7f3a");
        assert_eq!(second.sale_id, first.sale_id);
        assert_eq!(second.total, first.total);
        assert_eq!(second.line_count, 1);
        assert_eq!(second.unit_count, 4);

        let after = db.catalog().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(after.current_stock, 6);
        assert_eq!(db.sales().list_recent(10).await.unwrap().len(), 1);
        assert_eq!(
            db.ledger()
                .entries_for_sale("sale-retry-7f3a")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_product_lines_aggregate_to_one_ledger_entry() {
        let db = test_db().await;
        let item = seed_product(&db, "DUP-1", 100, 10).await;

        // Same product twice; the sale keeps both lines but the ledger
        // records one aggregated movement.
        let receipt = db
            .checkout()
            .checkout(
                &payload(vec![line(&item, 2), line(&item, 3)], 5.00),
                "cashier-1",
            )
            .await
            .unwrap();

        assert_eq!(db.sales().get_lines(&receipt.sale_id).await.unwrap().len(), 2);

        let entries = db.ledger().entries_for_sale(&receipt.sale_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, -5);

        let after = db.catalog().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(after.current_stock, 5);
    }

    #[tokio::test]
    async fn test_commit_exact_stock_to_zero() {
        let db = test_db().await;
        let item = seed_product(&db, "LAST-1", 100, 3).await;

        db.checkout()
            .checkout(&payload(vec![line(&item, 3)], 3.00), "cashier-1")
            .await
            .unwrap();

        let after = db.catalog().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(after.current_stock, 0);
    }

    #[tokio::test]
    async fn test_receipt_serializes_for_the_caller() {
        let db = test_db().await;
        let item = seed_product(&db, "JSON-1", 250, 5).await;

        let receipt = db
            .checkout()
            .checkout(&payload(vec![line(&item, 2)], 5.00), "cashier-1")
            .await
            .unwrap();

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["sale_id"], receipt.sale_id);
        assert_eq!(json["line_count"], 1);
        assert_eq!(json["unit_count"], 2);

        let back: CheckoutReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(back.total, receipt.total);
    }

    #[tokio::test]
    async fn test_customer_and_payment_method_persisted() {
        let db = test_db().await;
        let item = seed_product(&db, "CUST-1", 500, 2).await;

        let mut p = payload(vec![line(&item, 1)], 5.00);
        p.customer_id = Some("cust-42".to_string());
        p.payment_method = PaymentMethod::Card;

        let receipt = db.checkout().checkout(&p, "cashier-2").await.unwrap();
        let sale = db
            .sales()
            .get_by_id(&receipt.sale_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sale.customer_id.as_deref(), Some("cust-42"));
        assert_eq!(sale.payment_method, PaymentMethod::Card);
    }
}
