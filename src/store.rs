//! Product persistence seam.
//!
//! The stock service is constructed against [`ProductStore`] rather than a pool
//! so tests can substitute an in-memory double. Production uses Postgres.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Product row as seen by the stock flow.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub name_ar: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub stock_quantity: i32,
    pub is_active: bool,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Option<ProductRecord>, sqlx::Error>;

    /// Atomically decrement stock iff the product is active and has at least
    /// `quantity` units. Returns whether a row was updated.
    async fn try_decrement(&self, id: Uuid, quantity: i32) -> Result<bool, sqlx::Error>;

    /// Unconditional stock increase. A no-op for unknown ids.
    async fn increment(&self, id: Uuid, quantity: i32) -> Result<(), sqlx::Error>;

    /// Active products with stock at or below `threshold`, ascending by stock.
    async fn active_at_or_below(&self, threshold: i32) -> Result<Vec<ProductRecord>, sqlx::Error>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Claim the order for cancellation with a single conditional status
    /// flip. Returns false when the order is unknown, delivered, or already
    /// cancelled, so a repeat request can never claim it twice.
    async fn try_mark_cancelled(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    async fn status(&self, id: Uuid) -> Result<Option<String>, sqlx::Error>;

    /// `(product_id, quantity)` per line of the order.
    async fn line_quantities(&self, id: Uuid) -> Result<Vec<(Uuid, i32)>, sqlx::Error>;
}

const RECORD_COLUMNS: &str =
    "id, sku, name, name_ar, price, sale_price, stock_quantity, is_active";

#[derive(Clone)]
pub struct PgProductStore {
    pool: sqlx::PgPool,
}

impl PgProductStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<ProductRecord>, sqlx::Error> {
        sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn try_decrement(&self, id: Uuid, quantity: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() \
             WHERE id = $1 AND is_active AND stock_quantity >= $2",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment(&self, id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            tracing::warn!(product_id = %id, "stock release for unknown product");
        }
        Ok(())
    }

    async fn active_at_or_below(&self, threshold: i32) -> Result<Vec<ProductRecord>, sqlx::Error> {
        sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM products \
             WHERE is_active AND stock_quantity <= $1 ORDER BY stock_quantity ASC, name ASC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: sqlx::PgPool,
}

impl PgOrderStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn try_mark_cancelled(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('delivered', 'cancelled')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn status(&self, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(status,)| status))
    }

    async fn line_quantities(&self, id: Uuid) -> Result<Vec<(Uuid, i32)>, sqlx::Error> {
        sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE order_id = $1")
            .bind(id)
            .fetch_all(&self.pool)
            .await
    }
}
