//! # Product Catalog Repository
//!
//! Authoritative store of product identity, current price and current
//! stock. Consumed, not owned, by the checkout pipeline: validation takes
//! read-only snapshots here, and stock only ever moves through the
//! ledger's guarded delta.
//!
//! ## Key Operations
//! - Snapshot reads for cart validation
//! - Admin-side create (with an `initial` ledger entry) and manual stock
//!   adjustment (with an `adjustment` ledger entry), each in one
//!   transaction so the ledger never disagrees with the product row

use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CatalogError, DbError, DbResult, LedgerError};
use crate::repository::ledger::LedgerRepository;
use tally_core::validation::{
    validate_initial_stock, validate_price_cents, validate_product_name, validate_sku,
};
use tally_core::{EntryType, NewProduct, Product};

/// Column list shared by every product SELECT.
const PRODUCT_COLUMNS: &str = "id, sku, name, price_cents, current_stock, created_at, updated_at";

/// Repository for product catalog operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product: Option<Product> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product: Option<Product> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"))
                .bind(sku)
                .fetch_optional(&self.pool)
                .await?;

        Ok(product)
    }

    /// Fetches a read-only snapshot of the given products, keyed by id.
    ///
    /// Ids with no matching row are simply absent from the map; the cart
    /// validator turns those into an `UnknownProduct` rejection. No
    /// locking: the snapshot may go stale immediately, which is fine
    /// because the commit-time guard re-checks live state.
    pub async fn snapshot(&self, ids: &[String]) -> DbResult<HashMap<String, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let products: Vec<Product> = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        debug!(requested = ids.len(), found = products.len(), "Catalog snapshot");

        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// Lists products ordered by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products: Vec<Product> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Creates a product, recording any opening stock as an `initial`
    /// ledger entry in the same transaction.
    ///
    /// ## Returns
    /// The created product.
    ///
    /// ## Errors
    /// * [`CatalogError::Invalid`] - a field failed validation; nothing written
    /// * [`CatalogError::Db`] - e.g. duplicate SKU
    pub async fn create(&self, input: &NewProduct) -> Result<Product, CatalogError> {
        validate_sku(&input.sku)?;
        validate_product_name(&input.name)?;
        validate_price_cents(input.price_cents)?;
        validate_initial_stock(input.initial_stock)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(sku = %input.sku, "Creating product");

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_cents, current_stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(input.sku.trim())
        .bind(input.name.trim())
        .bind(input.price_cents)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        // The row starts at zero stock; the opening level arrives through
        // the ledger so it is reconstructible like every later movement.
        if input.initial_stock > 0 {
            LedgerRepository::apply_in(
                &mut tx,
                &id,
                input.initial_stock,
                EntryType::Initial,
                None,
                Some("opening stock at product creation"),
            )
            .await
            .map_err(|e| match e {
                LedgerError::Db(db) => CatalogError::Db(db),
                other => CatalogError::Db(DbError::Internal(other.to_string())),
            })?;
        }

        tx.commit().await.map_err(DbError::from)?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| CatalogError::Db(DbError::not_found("Product", &id)))
    }

    /// Updates a product's price.
    ///
    /// Carts validated against the old price will come back with a
    /// `PriceChanged` rejection, which is the point.
    pub async fn update_price(&self, id: &str, price_cents: i64) -> Result<(), CatalogError> {
        validate_price_cents(price_cents)?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price_cents)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::Db(DbError::not_found("Product", id)));
        }

        Ok(())
    }

    /// Manually adjusts a product's stock, recording an `adjustment`
    /// ledger entry in the same transaction.
    ///
    /// ## Returns
    /// The stock level after the adjustment.
    ///
    /// ## Errors
    /// * [`LedgerError::InsufficientStockAtCommit`] - the adjustment would
    ///   drive stock negative; nothing written
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        note: Option<&str>,
    ) -> Result<i64, LedgerError> {
        LedgerRepository::new(self.pool.clone())
            .apply(
                product_id,
                delta,
                EntryType::Adjustment,
                None,
                note.or(Some("manual stock adjustment")),
            )
            .await
    }

    /// Counts catalog products (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
