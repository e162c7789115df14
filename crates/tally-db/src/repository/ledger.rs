//! # Inventory Ledger Repository
//!
//! The append-only log of stock deltas per product, and the single
//! mutating primitive through which stock ever changes.
//!
//! ## The Guarded Delta
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Why a Conditional UPDATE, Not Check-Then-Act            │
//! │                                                                         │
//! │  ❌ RACY: read stock during validation, write later assuming it        │
//! │     hasn't moved:                                                       │
//! │       stock = SELECT current_stock ...      (sees 1)                   │
//! │       UPDATE products SET current_stock = 0 (both racers do this!)     │
//! │                                                                         │
//! │  ✅ GUARDED: the check rides inside the write itself:                  │
//! │       UPDATE products                                                   │
//! │       SET    current_stock = current_stock + :delta                    │
//! │       WHERE  id = :id AND current_stock + :delta >= 0                  │
//! │                                                                         │
//! │  Zero rows affected = the live stock could not cover the delta.        │
//! │  SQLite's single-writer transaction serializes the two racers, so      │
//! │  exactly one decrement wins and stock never goes negative.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger row is appended in the same atomic unit as the guarded
//! update, so invariant "current_stock == Σ deltas" holds at every commit
//! point. A partial unique index on (related_sale_id, product_id,
//! entry_type) rejects duplicate application for the same sale.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, LedgerError};
use tally_core::{EntryType, LedgerEntry};

/// Repository for the append-only stock ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Applies a stock delta and appends the matching ledger entry, as one
    /// transaction of its own.
    ///
    /// ## Arguments
    /// * `product_id` - Product whose stock moves
    /// * `delta` - Signed change: negative for sales, positive for restocks
    /// * `entry_type` - Cause of the movement
    /// * `related_sale_id` - Owning sale when the cause is a sale
    /// * `note` - Free-form context for the audit trail
    ///
    /// ## Returns
    /// The stock level after the delta was applied.
    ///
    /// ## Errors
    /// * [`LedgerError::InsufficientStockAtCommit`] - live stock could not
    ///   cover a negative delta; nothing was written
    /// * [`LedgerError::ProductNotFound`] - no such product row
    pub async fn apply(
        &self,
        product_id: &str,
        delta: i64,
        entry_type: EntryType,
        related_sale_id: Option<&str>,
        note: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let new_stock =
            Self::apply_in(&mut tx, product_id, delta, entry_type, related_sale_id, note).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(new_stock)
    }

    /// Applies a stock delta inside an enclosing transaction.
    ///
    /// This is the primitive the sale coordinator calls once per line; the
    /// coordinator owns the transaction so that a failing line takes every
    /// already-applied sibling down with it.
    pub(crate) async fn apply_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        delta: i64,
        entry_type: EntryType,
        related_sale_id: Option<&str>,
        note: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let now = Utc::now();

        debug!(product_id = %product_id, delta = %delta, entry_type = %entry_type, "Applying stock delta");

        // The guard is re-evaluated against live state at write time; this
        // is what resolves the check-then-act race between validation and
        // commit.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?2,
                updated_at = ?3
            WHERE id = ?1 AND current_stock + ?2 >= 0
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "product missing" from "guard refused the delta".
            let available: Option<i64> =
                sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?1")
                    .bind(product_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            return match available {
                None => Err(LedgerError::ProductNotFound(product_id.to_string())),
                Some(available) => Err(LedgerError::InsufficientStockAtCommit {
                    product_id: product_id.to_string(),
                    requested: -delta,
                    available,
                }),
            };
        }

        let entry_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO stock_ledger (
                id, product_id, entry_type, delta,
                related_sale_id, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry_id)
        .bind(product_id)
        .bind(entry_type)
        .bind(delta)
        .bind(related_sale_id)
        .bind(note)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let new_stock: i64 = sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(new_stock)
    }

    /// Derives a product's stock purely from its ledger entries.
    ///
    /// ## Invariant
    /// Must always equal `products.current_stock`; tests verify this after
    /// every kind of movement.
    pub async fn reconstructed_stock(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0) FROM stock_ledger WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Lists a product's ledger entries in commit order.
    pub async fn entries_for_product(&self, product_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = sqlx::query_as(
            r#"
            SELECT id, product_id, entry_type, delta, related_sale_id, note, created_at
            FROM stock_ledger
            WHERE product_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Lists the ledger entries belonging to a sale.
    pub async fn entries_for_sale(&self, sale_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = sqlx::query_as(
            r#"
            SELECT id, product_id, entry_type, delta, related_sale_id, note, created_at
            FROM stock_ledger
            WHERE related_sale_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::NewProduct;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> String {
        db.catalog()
            .create(&NewProduct {
                sku: sku.to_string(),
                name: format!("{sku} (test)"),
                price_cents,
                initial_stock: stock,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_apply_positive_and_negative_deltas() {
        let db = test_db().await;
        let id = seed_product(&db, "A-1", 1000, 10).await;
        let ledger = db.ledger();

        let stock = ledger
            .apply(&id, 5, EntryType::Adjustment, None, Some("restock"))
            .await
            .unwrap();
        assert_eq!(stock, 15);

        let stock = ledger
            .apply(&id, -15, EntryType::Adjustment, None, None)
            .await
            .unwrap();
        assert_eq!(stock, 0);
    }

    #[tokio::test]
    async fn test_guard_refuses_overdraw_and_writes_nothing() {
        let db = test_db().await;
        let id = seed_product(&db, "A-1", 1000, 3).await;
        let ledger = db.ledger();

        let err = ledger
            .apply(&id, -4, EntryType::Adjustment, None, None)
            .await
            .unwrap_err();
        match err {
            LedgerError::InsufficientStockAtCommit {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, id);
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected InsufficientStockAtCommit, got {other:?}"),
        }

        // Stock untouched, and only the initial entry exists.
        let product = db.catalog().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(product.current_stock, 3);
        assert_eq!(ledger.entries_for_product(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_is_distinct_from_guard_failure() {
        let db = test_db().await;
        let err = db
            .ledger()
            .apply("no-such-id", -1, EntryType::Adjustment, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProductNotFound(id) if id == "no-such-id"));
    }

    #[tokio::test]
    async fn test_reconstructed_stock_matches_current_after_movements() {
        let db = test_db().await;
        let id = seed_product(&db, "A-1", 1000, 7).await;
        let ledger = db.ledger();

        ledger
            .apply(&id, -2, EntryType::Adjustment, None, None)
            .await
            .unwrap();
        ledger
            .apply(&id, 10, EntryType::Adjustment, None, None)
            .await
            .unwrap();

        let product = db.catalog().get_by_id(&id).await.unwrap().unwrap();
        let reconstructed = ledger.reconstructed_stock(&id).await.unwrap();
        assert_eq!(product.current_stock, 15);
        assert_eq!(reconstructed, product.current_stock);
    }

    #[tokio::test]
    async fn test_duplicate_sale_application_rejected() {
        let db = test_db().await;
        let id = seed_product(&db, "A-1", 1000, 10).await;
        let ledger = db.ledger();

        // A sale row the ledger entries can reference.
        sqlx::query(
            r#"
            INSERT INTO sales (id, customer_id, user_id, payment_method,
                               total_cents, final_cents, status, created_at)
            VALUES ('s1', NULL, 'op', 'cash', 1000, 1000, 'completed', ?1)
            "#,
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        ledger
            .apply(&id, -1, EntryType::Sale, Some("s1"), None)
            .await
            .unwrap();

        // Replaying the same (sale, product, cause) hits the unique index.
        let err = ledger
            .apply(&id, -1, EntryType::Sale, Some("s1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Db(DbError::UniqueViolation { .. })));

        // Only one decrement landed.
        let product = db.catalog().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(product.current_stock, 9);
        assert_eq!(ledger.reconstructed_stock(&id).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_entries_for_product_in_commit_order() {
        let db = test_db().await;
        let id = seed_product(&db, "A-1", 1000, 5).await;
        let ledger = db.ledger();

        ledger
            .apply(&id, -1, EntryType::Adjustment, None, Some("first"))
            .await
            .unwrap();
        ledger
            .apply(&id, 2, EntryType::Adjustment, None, Some("second"))
            .await
            .unwrap();

        let entries = ledger.entries_for_product(&id).await.unwrap();
        let deltas: Vec<i64> = entries.iter().map(|e| e.delta).collect();
        assert_eq!(deltas, vec![5, -1, 2]);
        assert_eq!(entries[0].entry_type, EntryType::Initial);
    }
}
