//! Per-size stock records.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Remaining purchasable quantity of one product in one size.
///
/// One-size products use `size: None`. Quantity is unsigned: the store clamps
/// at zero instead of going negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: u32,
}

impl InventoryRecord {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.quantity > 0
    }
}

/// Result of decrementing one inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecrementOutcome {
    /// The full quantity was taken.
    Applied { remaining: u32 },
    /// Stock was short; the row was clamped to zero.
    Clamped { requested: u32, available: u32 },
    /// No inventory row exists for the product and size.
    Missing,
}

impl DecrementOutcome {
    /// True when stock records no longer agree with what was sold.
    #[must_use]
    pub const fn needs_reconciliation(&self) -> bool {
        !matches!(self, Self::Applied { .. })
    }
}
