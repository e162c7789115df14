//! # Sale Repository
//!
//! Reads and writes for committed sales and their line items. Sale rows
//! are created only by the coordinator's commit transaction (through the
//! `pub(crate)` insert helpers here); everything public is read-side,
//! plus the void transition used by the invoice workflow.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{Sale, SaleLine, SaleStatus, ValidatedLine};

const SALE_COLUMNS: &str =
    "id, customer_id, user_id, payment_method, total_cents, final_cents, status, created_at";

const SALE_LINE_COLUMNS: &str = "id, sale_id, product_id, sku_snapshot, name_snapshot, \
     quantity, unit_price_cents, line_total_cents, created_at";

/// Repository for sale records.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale: Option<Sale> =
            sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(sale)
    }

    /// Gets the line items of a sale, in insertion order.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines: Vec<SaleLine> = sqlx::query_as(&format!(
            "SELECT {SALE_LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists the most recent sales.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales: Vec<Sale> = sqlx::query_as(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Marks a completed sale as voided.
    ///
    /// Only flips the status; restocking the goods is the invoice
    /// workflow's job and arrives as `adjustment` ledger entries.
    pub async fn void_sale(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1 AND status = ?3")
            .bind(id)
            .bind(SaleStatus::Voided)
            .bind(SaleStatus::Completed)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// Inserts the sale header row inside the coordinator's transaction.
    pub(crate) async fn insert_sale_in(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, user_id, payment_method,
                total_cents, final_cents, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(sale.payment_method)
        .bind(sale.total_cents)
        .bind(sale.final_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one snapshot line item inside the coordinator's transaction.
    pub(crate) async fn insert_line_in(
        conn: &mut SqliteConnection,
        sale_id: &str,
        line: &ValidatedLine,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, sku_snapshot, name_snapshot,
                quantity, unit_price_cents, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(sale_id)
        .bind(&line.product_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.unit_price.cents())
        .bind(line.line_total.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::PaymentMethod;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_sale(id: &str) -> Sale {
        Sale {
            id: id.to_string(),
            customer_id: None,
            user_id: "cashier-1".to_string(),
            payment_method: PaymentMethod::Cash,
            total_cents: 1500,
            final_cents: 1500,
            status: SaleStatus::Completed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = test_db().await;
        let sale = sample_sale("sale-1");

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_sale_in(&mut tx, &sale).await.unwrap();
        tx.commit().await.unwrap();

        let found = db.sales().get_by_id("sale-1").await.unwrap().unwrap();
        assert_eq!(found.user_id, "cashier-1");
        assert_eq!(found.payment_method, PaymentMethod::Cash);
        assert_eq!(found.status, SaleStatus::Completed);
        assert_eq!(found.final_cents, 1500);

        assert!(db.sales().get_by_id("ghost").await.unwrap().is_none());
        assert!(db.sales().get_lines("sale-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_void_sale_transitions_once() {
        let db = test_db().await;

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_sale_in(&mut tx, &sample_sale("sale-2"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        db.sales().void_sale("sale-2").await.unwrap();
        let voided = db.sales().get_by_id("sale-2").await.unwrap().unwrap();
        assert_eq!(voided.status, SaleStatus::Voided);

        // Already voided: the guarded UPDATE matches nothing.
        let err = db.sales().void_sale("sale-2").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let db = test_db().await;

        let mut tx = db.pool().begin().await.unwrap();
        for id in ["s-a", "s-b", "s-c"] {
            SaleRepository::insert_sale_in(&mut tx, &sample_sale(id))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let recent = db.sales().list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "s-c");
        assert_eq!(recent[1].id, "s-b");
    }
}
