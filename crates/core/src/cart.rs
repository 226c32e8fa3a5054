//! Session cart.
//!
//! The cart is a plain value: every mutation is synchronous and the caller is
//! responsible for persisting the whole snapshot afterwards. Lines are keyed by
//! `(product_id, selected_size)`, so adding the same product in the same size
//! bumps the quantity instead of creating a second line.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Catalog fields needed to put a product in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    /// Size labels the product is sold in. Empty for one-size products.
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl ProductSummary {
    /// Products sold in sizes cannot be checked out without one selected.
    #[must_use]
    pub fn requires_size(&self) -> bool {
        !self.sizes.is_empty()
    }
}

/// Identifies a single line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
}

impl LineKey {
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, size: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.map(str::to_owned),
        }
    }
}

/// One product (in one size) in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    /// Always at least 1; a line that would drop to 0 is removed.
    pub quantity: u32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    /// Copied from the catalog when the line is created.
    #[serde(default)]
    pub requires_size: bool,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    fn key_matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.selected_size == key.size
    }

    /// The key this line is stored under.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            size: self.selected_size.clone(),
        }
    }
}

/// An ordered collection of cart lines.
///
/// Order only matters for display; totals are order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add one unit of `product`, merging with an existing line of the same size.
    pub fn add(&mut self, product: &ProductSummary, size: Option<String>, color: Option<String>) {
        self.add_quantity(product, size, color, 1);
    }

    /// Add `quantity` units of `product`. A quantity of zero is ignored.
    pub fn add_quantity(
        &mut self,
        product: &ProductSummary,
        size: Option<String>,
        color: Option<String>,
        quantity: u32,
    ) {
        if quantity == 0 {
            return;
        }

        let key = LineKey {
            product_id: product.id.clone(),
            size,
        };

        if let Some(line) = self.lines.iter_mut().find(|l| l.key_matches(&key)) {
            line.quantity = line.quantity.saturating_add(quantity);
            if color.is_some() {
                line.selected_color = color;
            }
            return;
        }

        self.lines.push(CartLine {
            product_id: key.product_id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            selected_size: key.size,
            selected_color: color,
            image_ref: product.image_ref.clone(),
            requires_size: product.requires_size(),
        });
    }

    /// Remove a line. Returns `false` if it was not in the cart.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.key_matches(key));
        self.lines.len() != before
    }

    /// Set a line's quantity; `n <= 0` removes it.
    ///
    /// Returns `false` if the line was not in the cart.
    pub fn set_quantity(&mut self, key: &LineKey, n: i64) -> bool {
        let Ok(quantity) = u32::try_from(n) else {
            // Negative, or larger than any real order
            return if n <= 0 { self.remove(key) } else { false };
        };
        if quantity == 0 {
            return self.remove(key);
        }

        match self.lines.iter_mut().find(|l| l.key_matches(key)) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.quantity))
    }

    /// `Σ unit_price × quantity`, recomputed on every call.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// True when any line needs a size but has none selected.
    #[must_use]
    pub fn has_unsized_lines(&self) -> bool {
        self.lines
            .iter()
            .any(|l| l.requires_size && l.selected_size.is_none())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn product(id: &str, price: &str, sizes: &[&str]) -> ProductSummary {
        ProductSummary {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Decimal::from_str(price).unwrap(),
            category: "shoes".to_owned(),
            sizes: sizes.iter().map(|s| (*s).to_owned()).collect(),
            image_ref: None,
        }
    }

    #[test]
    fn test_add_same_product_and_size_merges() {
        let mut cart = Cart::new();
        let p1 = product("P1", "57.50", &["38", "39"]);
        cart.add(&p1, Some("38".into()), None);
        cart.add(&p1, Some("38".into()), None);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_add_same_product_different_size_is_separate_line() {
        let mut cart = Cart::new();
        let p1 = product("P1", "57.50", &["38", "39"]);
        cart.add(&p1, Some("38".into()), None);
        cart.add(&p1, Some("39".into()), None);

        assert_eq!(cart.lines().len(), 2);
    }

    #[test]
    fn test_total_tracks_every_mutation() {
        let mut cart = Cart::new();
        let p1 = product("P1", "57.50", &[]);
        let p2 = product("P2", "10.25", &[]);

        cart.add(&p1, None, None);
        assert_eq!(cart.total(), Decimal::from_str("57.50").unwrap());

        cart.add_quantity(&p2, None, None, 3);
        assert_eq!(cart.total(), Decimal::from_str("88.25").unwrap());

        cart.set_quantity(&LineKey::new("P1", None), 2);
        assert_eq!(cart.total(), Decimal::from_str("145.75").unwrap());

        cart.remove(&LineKey::new("P2", None));
        assert_eq!(cart.total(), Decimal::from_str("115.00").unwrap());
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes() {
        let mut cart = Cart::new();
        let p1 = product("P1", "5", &[]);
        cart.add(&p1, None, None);
        assert!(cart.set_quantity(&LineKey::new("P1", None), 0));
        assert!(cart.is_empty());

        cart.add(&p1, None, None);
        assert!(cart.set_quantity(&LineKey::new("P1", None), -4));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_line() {
        let mut cart = Cart::new();
        assert!(!cart.set_quantity(&LineKey::new("nope", None), 3));
    }

    #[test]
    fn test_add_zero_is_ignored() {
        let mut cart = Cart::new();
        cart.add_quantity(&product("P1", "5", &[]), None, None, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_unsized_line_detection() {
        let mut cart = Cart::new();
        cart.add(&product("S1", "80", &["40"]), None, None);
        assert!(cart.has_unsized_lines());

        cart.clear();
        cart.add(&product("S1", "80", &["40"]), Some("40".into()), None);
        cart.add(&product("H1", "15", &[]), None, None);
        assert!(!cart.has_unsized_lines());
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_order() {
        let mut cart = Cart::new();
        cart.add(&product("B", "1", &[]), None, None);
        cart.add(&product("A", "2", &[]), None, None);

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
        assert_eq!(restored.lines()[0].product_id.as_str(), "B");
    }
}
