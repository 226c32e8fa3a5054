//! Product catalog read model.
//!
//! Product lookups happen on every cart add and again at checkout, so rows are
//! cached with `moka` (5-minute TTL). Misses are not cached.

use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use larkspur_core::{ProductId, ProductSummary};

use super::RepositoryError;
use crate::store::Catalog;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: Decimal,
    category: String,
    sizes: Vec<String>,
    image_ref: Option<String>,
}

impl From<ProductRow> for ProductSummary {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            category: row.category,
            sizes: row.sizes,
            image_ref: row.image_ref,
        }
    }
}

/// `PostgreSQL`-backed [`Catalog`] with an in-process cache.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
    cache: Cache<ProductId, ProductSummary>,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { pool, cache }
    }
}

impl Catalog for PgCatalog {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<Option<ProductSummary>, RepositoryError> {
        if let Some(product) = self.cache.get(id).await {
            return Ok(Some(product));
        }

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, category, sizes, image_ref
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(product) = row.map(ProductSummary::from) else {
            return Ok(None);
        };
        self.cache.insert(id.clone(), product.clone()).await;
        Ok(Some(product))
    }
}
