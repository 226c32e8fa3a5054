//! Inventory lookups used by the product page and checkout validation.
//!
//! Every lookup fails closed: if stock cannot be read, the product is treated
//! as having no sizes available.

use tracing::{instrument, warn};

use larkspur_core::{Cart, ProductId};

use crate::store::InventoryStore;

/// Sizes of `product_id` with stock remaining, in stored order.
///
/// A one-size product in stock yields an empty list and `Some(true)` from
/// [`in_stock`]; use that for products without sizes.
#[instrument(skip(inventory), fields(product_id = %product_id))]
pub async fn available_sizes<I: InventoryStore>(
    inventory: &I,
    product_id: &ProductId,
) -> Vec<String> {
    match inventory.records(product_id).await {
        Ok(records) => records
            .into_iter()
            .filter(|r| r.is_available())
            .filter_map(|r| r.size)
            .collect(),
        Err(e) => {
            warn!(error = %e, "Inventory lookup failed; offering no sizes");
            Vec::new()
        }
    }
}

/// A cart line whose requested quantity exceeds the stock on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortage {
    pub product_id: ProductId,
    pub name: String,
    pub size: Option<String>,
    pub requested: u32,
    pub available: u32,
}

impl std::fmt::Display for Shortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.size {
            Some(size) => write!(
                f,
                "{} (size {size}): {} requested, {} available",
                self.name, self.requested, self.available
            ),
            None => write!(
                f,
                "{}: {} requested, {} available",
                self.name, self.requested, self.available
            ),
        }
    }
}

/// Check every cart line against current stock.
///
/// Lines with no inventory row, or whose row cannot be read, count as zero
/// available.
pub async fn shortages<I: InventoryStore>(inventory: &I, cart: &Cart) -> Vec<Shortage> {
    let mut short = Vec::new();
    for line in cart.lines() {
        let available = match inventory
            .quantity(&line.product_id, line.selected_size.as_deref())
            .await
        {
            Ok(quantity) => quantity.unwrap_or(0),
            Err(e) => {
                warn!(product_id = %line.product_id, error = %e, "Stock check failed");
                0
            }
        };
        if line.quantity > available {
            short.push(Shortage {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                size: line.selected_size.clone(),
                requested: line.quantity,
                available,
            });
        }
    }
    short
}

/// Whether a one-size product has any stock. `None` if there is no row.
pub async fn in_stock<I: InventoryStore>(inventory: &I, product_id: &ProductId) -> Option<bool> {
    match inventory.quantity(product_id, None).await {
        Ok(quantity) => quantity.map(|q| q > 0),
        Err(e) => {
            warn!(product_id = %product_id, error = %e, "Stock check failed");
            Some(false)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use larkspur_core::ProductSummary;

    use super::*;
    use crate::store::memory::MemoryInventoryStore;

    #[tokio::test]
    async fn test_available_sizes_skips_sold_out() {
        let inventory = MemoryInventoryStore::default();
        let id = ProductId::new("runner");
        inventory.set_quantity(&id, Some("38"), 2).await.unwrap();
        inventory.set_quantity(&id, Some("39"), 0).await.unwrap();
        inventory.set_quantity(&id, Some("40"), 1).await.unwrap();

        assert_eq!(available_sizes(&inventory, &id).await, vec!["38", "40"]);
    }

    #[tokio::test]
    async fn test_lookup_failure_offers_nothing() {
        let inventory = MemoryInventoryStore::default();
        let id = ProductId::new("runner");
        inventory.set_quantity(&id, Some("38"), 2).await.unwrap();
        inventory.fail_reads(true);

        assert!(available_sizes(&inventory, &id).await.is_empty());
        assert_eq!(in_stock(&inventory, &id).await, Some(false));
    }

    #[tokio::test]
    async fn test_shortages() {
        let inventory = MemoryInventoryStore::default();
        let product = ProductSummary {
            id: ProductId::new("runner"),
            name: "Trail Runner".to_owned(),
            price: Decimal::from_str("57.50").unwrap(),
            category: "shoes".to_owned(),
            sizes: vec!["38".to_owned()],
            image_ref: None,
        };
        inventory
            .set_quantity(&product.id, Some("38"), 1)
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add(&product, Some("38".to_owned()), None);
        assert!(shortages(&inventory, &cart).await.is_empty());

        cart.add(&product, Some("38".to_owned()), None);
        let short = shortages(&inventory, &cart).await;
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].requested, 2);
        assert_eq!(short[0].available, 1);
    }
}
