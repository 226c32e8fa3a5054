//! Inventory repository.
//!
//! One-size products are stored with an empty-string size so the composite
//! primary key `(product_id, size)` never contains a NULL.

use sqlx::PgPool;

use larkspur_core::{DecrementOutcome, InventoryRecord, ProductId};

use super::{RepositoryError, to_i32, to_u32};
use crate::store::InventoryStore;

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    product_id: ProductId,
    size: String,
    quantity: i32,
}

impl TryFrom<InventoryRow> for InventoryRecord {
    type Error = RepositoryError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            size: (!row.size.is_empty()).then_some(row.size),
            quantity: to_u32(row.quantity, "inventory quantity")?,
        })
    }
}

fn size_key(size: Option<&str>) -> &str {
    size.unwrap_or_default()
}

/// `PostgreSQL`-backed [`InventoryStore`].
#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl InventoryStore for PgInventoryStore {
    async fn records(&self, product_id: &ProductId) -> Result<Vec<InventoryRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r"
            SELECT product_id, size, quantity
            FROM storefront.inventory
            WHERE product_id = $1
            ORDER BY size
            ",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InventoryRecord::try_from).collect()
    }

    async fn quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
    ) -> Result<Option<u32>, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            r"
            SELECT quantity FROM storefront.inventory
            WHERE product_id = $1 AND size = $2
            ",
        )
        .bind(product_id)
        .bind(size_key(size))
        .fetch_optional(&self.pool)
        .await?;

        quantity.map(|q| to_u32(q, "inventory quantity")).transpose()
    }

    async fn decrement(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent buyers of the same size.
        let current: Option<i32> = sqlx::query_scalar(
            r"
            SELECT quantity FROM storefront.inventory
            WHERE product_id = $1 AND size = $2
            FOR UPDATE
            ",
        )
        .bind(product_id)
        .bind(size_key(size))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(DecrementOutcome::Missing);
        };
        let available = to_u32(current, "inventory quantity")?;
        let remaining = available.saturating_sub(quantity);

        sqlx::query(
            r"
            UPDATE storefront.inventory
            SET quantity = $3, updated_at = NOW()
            WHERE product_id = $1 AND size = $2
            ",
        )
        .bind(product_id)
        .bind(size_key(size))
        .bind(to_i32(remaining)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if available >= quantity {
            Ok(DecrementOutcome::Applied { remaining })
        } else {
            Ok(DecrementOutcome::Clamped {
                requested: quantity,
                available,
            })
        }
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.inventory (product_id, size, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, size)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            ",
        )
        .bind(product_id)
        .bind(size_key(size))
        .bind(to_i32(quantity)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_size_maps_to_one_size() {
        let record = InventoryRecord::try_from(InventoryRow {
            product_id: ProductId::new("tote"),
            size: String::new(),
            quantity: 3,
        });
        assert!(matches!(record, Ok(InventoryRecord { size: None, quantity: 3, .. })));
    }

    #[test]
    fn test_negative_quantity_is_corruption() {
        let record = InventoryRecord::try_from(InventoryRow {
            product_id: ProductId::new("tee"),
            size: "M".to_owned(),
            quantity: -1,
        });
        assert!(matches!(record, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_size_key() {
        assert_eq!(size_key(None), "");
        assert_eq!(size_key(Some("L")), "L");
    }
}
