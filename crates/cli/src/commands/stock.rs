//! Inventory management commands.
//!
//! # Usage
//!
//! ```bash
//! # Set stock for one size
//! lark stock set -p P1 -s 38 -q 12
//!
//! # Set stock for a one-size product
//! lark stock set -p BAG-01 -q 4
//!
//! # Show stock rows for a product
//! lark stock show -p P1
//! ```

use larkspur_core::ProductId;
use larkspur_storefront::db::PgInventoryStore;
use larkspur_storefront::store::InventoryStore;

use super::{CommandError, connect};

/// Overwrite the quantity for one (product, size).
pub async fn set(product: &str, size: Option<&str>, quantity: u32) -> Result<(), CommandError> {
    let product_id = parse_product(product)?;
    let size = size.map(str::trim).filter(|s| !s.is_empty());

    let store = PgInventoryStore::new(connect().await?);
    store.set_quantity(&product_id, size, quantity).await?;

    tracing::info!(
        product_id = %product_id,
        size = size.unwrap_or("-"),
        quantity,
        "Stock updated"
    );
    Ok(())
}

/// Print every stock row for a product.
pub async fn show(product: &str) -> Result<(), CommandError> {
    let product_id = parse_product(product)?;

    let store = PgInventoryStore::new(connect().await?);
    let records = store.records(&product_id).await?;

    #[allow(clippy::print_stdout)]
    {
        if records.is_empty() {
            println!("No stock rows for {product_id}");
        }
        for record in records {
            println!(
                "{:<24} {:<8} {:>6}",
                record.product_id,
                record.size.as_deref().unwrap_or("-"),
                record.quantity
            );
        }
    }
    Ok(())
}

fn parse_product(product: &str) -> Result<ProductId, CommandError> {
    let trimmed = product.trim();
    if trimmed.is_empty() {
        return Err(CommandError::InvalidArgument(
            "product id must not be empty".to_owned(),
        ));
    }
    Ok(ProductId::new(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_rejects_blank() {
        assert!(parse_product("  ").is_err());
        assert_eq!(parse_product(" P1 ").ok(), Some(ProductId::new("P1")));
    }
}
