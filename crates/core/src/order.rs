//! Orders and the views derived from them.
//!
//! Items are embedded in the order record. The order total is fixed when the
//! order is created from the draft and is never recomputed, so later catalog
//! price changes do not rewrite history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::types::{
    CustomerId, Email, OrderId, OrderStatus, OrderType, PaymentStatus, ProductId,
};

/// A purchased line, priced at the time of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    /// Unit price charged.
    pub price: Decimal,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            price: line.unit_price,
            size: line.selected_size.clone(),
            color: line.selected_color.clone(),
        }
    }
}

/// Contact and shipping details entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
}

/// How the order was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Payment method label, e.g. `card`.
    pub method: String,
    /// Gateway authorization id.
    pub reference: String,
    /// Amount the gateway confirmed, in standard units.
    pub amount: Decimal,
}

/// Everything needed to persist an order except store-assigned fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer: CustomerDetails,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderItem>,
    pub payment: PaymentRecord,
}

impl OrderDraft {
    /// `Σ price × quantity` over the draft's items.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        if self.customer_id.is_some() {
            OrderType::Registered
        } else {
            OrderType::Guest
        }
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: String,
    pub customer_address: String,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub payment_reference: String,
    pub payment_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the order record for a draft whose payment is already confirmed.
    #[must_use]
    pub fn from_draft(draft: OrderDraft, order_number: String, now: DateTime<Utc>) -> Self {
        let total = draft.total();
        let order_type = draft.order_type();
        Self {
            id: OrderId::new(),
            order_number,
            customer_id: draft.customer_id,
            customer_name: draft.customer.name,
            customer_email: draft.customer.email,
            customer_phone: draft.customer.phone,
            customer_address: draft.customer.address,
            items: draft.items,
            total,
            status: OrderStatus::Pending,
            order_type,
            payment_status: PaymentStatus::Completed,
            payment_method: draft.payment.method,
            payment_reference: draft.payment.reference,
            payment_amount: draft.payment.amount,
            created_at: now,
            updated_at: now,
        }
    }

    /// Redacted view returned by order tracking.
    #[must_use]
    pub fn to_view(&self) -> OrderView {
        OrderView {
            order_number: self.order_number.clone(),
            customer_first_name: self
                .customer_name
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_owned(),
            masked_email: mask_email(&self.customer_email),
            items: self.items.clone(),
            total: self.total,
            status: self.status,
            payment_status: self.payment_status,
            order_type: self.order_type,
            created_at: self.created_at,
        }
    }
}

/// Order contents and status without contact, address, or payment details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_number: String,
    pub customer_first_name: String,
    pub masked_email: String,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_type: OrderType,
    pub created_at: DateTime<Utc>,
}

/// `shopper@example.com` becomes `s******@example.com`.
fn mask_email(email: &Email) -> String {
    let (local, domain) = email.as_str().split_once('@').unwrap_or((email.as_str(), ""));
    let mut chars = local.chars();
    let first = chars.next().map(String::from).unwrap_or_default();
    let hidden = "*".repeat(chars.count());
    format!("{first}{hidden}@{domain}")
}
