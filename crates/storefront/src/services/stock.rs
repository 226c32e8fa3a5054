//! Stock decrementer.
//!
//! Runs after the order is written. Nothing here can fail the checkout: every
//! problem becomes a [`StockWarning`] that the caller logs.

use tracing::{info, instrument, warn};

use larkspur_core::{DecrementOutcome, OrderItem, ProductId};

use crate::store::InventoryStore;

/// A line whose stock no longer matches what was sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockWarning {
    pub product_id: ProductId,
    pub size: Option<String>,
    pub detail: String,
}

impl std::fmt::Display for StockWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.size {
            Some(size) => write!(f, "{} size {size}: {}", self.product_id, self.detail),
            None => write!(f, "{}: {}", self.product_id, self.detail),
        }
    }
}

/// Decrement stock for every purchased line.
///
/// Each line is one atomic decrement; lines are independent, so a failure on
/// one does not stop the rest.
#[instrument(skip_all, fields(order_number = %order_number, lines = items.len()))]
pub async fn decrement<I: InventoryStore>(
    inventory: &I,
    order_number: &str,
    items: &[OrderItem],
) -> Vec<StockWarning> {
    let mut warnings = Vec::new();

    for item in items {
        let size = item.size.as_deref();
        let detail = match inventory.decrement(&item.product_id, size, item.quantity).await {
            Ok(DecrementOutcome::Applied { remaining }) => {
                info!(product_id = %item.product_id, ?size, remaining, "Stock decremented");
                continue;
            }
            Ok(DecrementOutcome::Clamped {
                requested,
                available,
            }) => format!("sold {requested} with {available} on hand; clamped to 0"),
            Ok(DecrementOutcome::Missing) => "no inventory record".to_owned(),
            Err(e) => format!("decrement failed: {e}"),
        };

        warn!(
            product_id = %item.product_id,
            ?size,
            %detail,
            "Stock reconciliation needed"
        );
        warnings.push(StockWarning {
            product_id: item.product_id.clone(),
            size: item.size.clone(),
            detail,
        });
    }

    warnings
}
