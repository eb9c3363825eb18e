//! Database operations for `products`, and the Postgres [`ProductStore`].

use affdb_core::StoredProductSummary;
use affdb_ingest::{Fingerprint, ProductRecord, ProductStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub product_url: String,
    pub fingerprint: String,
    /// The schema defines this as `INTEGER NOT NULL CHECK (>= 0)`.
    pub quality_score: i32,
    pub title: String,
    pub description: String,
    pub brand: String,
    pub price: Option<Decimal>,
    pub currency: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub source_network: String,
    pub source_id: String,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns needed to re-score a stored product during conflict resolution.
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    product_url: String,
    description: String,
    price: Option<Decimal>,
    brand: String,
    image_url: Option<String>,
    rating: Option<f64>,
}

impl From<SummaryRow> for StoredProductSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            product_url: row.product_url,
            description: row.description,
            price: row.price,
            brand: row.brand,
            image_url: row.image_url,
            rating: row.rating,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, product_url, fingerprint, quality_score, title, description, \
     brand, price, currency, image_url, tags, source_network, source_id, category, rating, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Returns the best product stored under `fingerprint`: highest quality
/// score, then lowest price (unpriced rows last), then lowest id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_best_by_fingerprint(
    pool: &PgPool,
    fingerprint: &str,
) -> Result<Option<StoredProductSummary>, DbError> {
    let row = sqlx::query_as::<_, SummaryRow>(
        "SELECT id, product_url, description, price, brand, image_url, rating \
         FROM products \
         WHERE fingerprint = $1 \
         ORDER BY quality_score DESC, price ASC NULLS LAST, id ASC \
         LIMIT 1",
    )
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredProductSummary::from))
}

/// Inserts a product or overwrites the existing row with the same
/// `product_url`. Returns the row id.
///
/// # Errors
///
/// Returns [`DbError::OutOfRange`] if the quality score does not fit the
/// column, or [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(pool: &PgPool, record: &ProductRecord) -> Result<i64, DbError> {
    let product = &record.product;
    let quality_score = i32::try_from(record.quality_score)
        .map_err(|_| DbError::OutOfRange(format!("quality_score {}", record.quality_score)))?;
    let tags: Vec<String> = product.tags.iter().cloned().collect();

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (product_url, fingerprint, quality_score, title, description, brand, price, \
              currency, image_url, tags, source_network, source_id, category, rating) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (product_url) DO UPDATE SET \
             fingerprint    = EXCLUDED.fingerprint, \
             quality_score  = EXCLUDED.quality_score, \
             title          = EXCLUDED.title, \
             description    = EXCLUDED.description, \
             brand          = EXCLUDED.brand, \
             price          = EXCLUDED.price, \
             currency       = EXCLUDED.currency, \
             image_url      = EXCLUDED.image_url, \
             tags           = EXCLUDED.tags, \
             source_network = EXCLUDED.source_network, \
             source_id      = EXCLUDED.source_id, \
             category       = EXCLUDED.category, \
             rating         = EXCLUDED.rating, \
             updated_at     = NOW() \
         RETURNING id",
    )
    .bind(&product.product_url)
    .bind(record.fingerprint.as_str())
    .bind(quality_score)
    .bind(&product.title)
    .bind(&product.description)
    .bind(&product.brand)
    .bind(product.price)
    .bind(&product.currency)
    .bind(product.image_url.as_deref())
    .bind(&tags)
    .bind(product.source_network.as_str())
    .bind(&product.source_id)
    .bind(product.category.as_deref())
    .bind(product.rating)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Deletes the product with `id`. A missing row is not an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_product(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(id, "delete skipped; product already gone");
    }
    Ok(())
}

/// Fetches a product by its natural key.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has this URL, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_product_by_url(pool: &PgPool, product_url: &str) -> Result<ProductRow, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_url = $1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product_url)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Total number of stored products.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// ProductStore
// ---------------------------------------------------------------------------

/// [`ProductStore`] backed by the `products` table.
#[derive(Debug, Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredProductSummary>, StoreError> {
        Ok(find_best_by_fingerprint(&self.pool, fingerprint.as_str()).await?)
    }

    async fn upsert_by_url(&self, record: &ProductRecord) -> Result<i64, StoreError> {
        Ok(upsert_product(&self.pool, record).await?)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        Ok(delete_product(&self.pool, id).await?)
    }
}
