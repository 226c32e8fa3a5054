//! Order writer.
//!
//! An order is written once, complete, after the payment is confirmed. Items
//! are embedded in the order row so there is no second write to fail.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{instrument, warn};

use larkspur_core::{Order, OrderDraft};

use crate::db::RepositoryError;
use crate::store::OrderStore;

/// Prefix on every human-facing order number.
pub const ORDER_NUMBER_PREFIX: &str = "ORD-";

/// Attempts before giving up on a unique order number.
const MAX_NUMBER_ATTEMPTS: usize = 3;

/// Build an order number: low 6 digits of the millisecond timestamp, then a
/// zero-padded 3-digit random suffix. For example `ORD-481923-007`.
#[must_use]
pub fn generate_order_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: u16 = rng.random_range(0..1000);
    format!("{ORDER_NUMBER_PREFIX}{millis:06}-{suffix:03}")
}

/// Persist `draft` as a new pending order.
///
/// The caller must only invoke this after payment confirmation. An order
/// number collision is retried with a fresh number; any other failure is
/// returned without retrying.
///
/// # Errors
///
/// Returns the last `RepositoryError` if the order could not be written.
#[instrument(skip(orders, draft), fields(email = %draft.customer.email))]
pub async fn create_order<O: OrderStore>(
    orders: &O,
    draft: OrderDraft,
) -> Result<Order, RepositoryError> {
    let now = Utc::now();
    let mut order = Order::from_draft(draft, generate_order_number(now, &mut rand::rng()), now);

    let mut attempt = 1;
    loop {
        match orders.insert(&order).await {
            Ok(()) => return Ok(order),
            Err(RepositoryError::Conflict(msg)) if attempt < MAX_NUMBER_ATTEMPTS => {
                warn!(order_number = %order.order_number, %msg, "Order number collision, retrying");
                order.order_number = generate_order_number(Utc::now(), &mut rand::rng());
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal::Decimal;

    use larkspur_core::{
        CustomerDetails, Email, OrderItem, OrderStatus, PaymentRecord, PaymentStatus, ProductId,
    };

    use super::*;
    use crate::store::memory::MemoryOrderStore;

    fn draft() -> OrderDraft {
        OrderDraft {
            customer: CustomerDetails {
                name: "Ada Lovelace".to_owned(),
                email: Email::parse("a@b.com").unwrap(),
                phone: "555-0100".to_owned(),
                address: "1 Analytical Way".to_owned(),
            },
            customer_id: None,
            items: vec![OrderItem {
                product_id: ProductId::new("P1"),
                name: "Trail Runner".to_owned(),
                quantity: 1,
                price: Decimal::from_str("57.50").unwrap(),
                size: Some("38".to_owned()),
                color: None,
            }],
            payment: PaymentRecord {
                method: "card".to_owned(),
                reference: "pi_1".to_owned(),
                amount: Decimal::from_str("57.50").unwrap(),
            },
        }
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = generate_order_number(now, &mut rng);

        assert!(number.starts_with("ORD-123456-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 3);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_order_number_pads_small_timestamps() {
        let now = Utc.timestamp_millis_opt(1_000_000_000_042).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_order_number(now, &mut rng).starts_with("ORD-000042-"));
    }

    #[tokio::test]
    async fn test_create_order_is_pending_and_paid() {
        let orders = MemoryOrderStore::default();
        let order = create_order(&orders, draft()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.total, Decimal::from_str("57.50").unwrap());
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn test_collision_is_retried() {
        let orders = MemoryOrderStore::default();
        orders.reject_next_inserts_as_conflict(2);

        let order = create_order(&orders, draft()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert!(order.order_number.starts_with(ORDER_NUMBER_PREFIX));
    }

    #[tokio::test]
    async fn test_persistent_collision_gives_up() {
        let orders = MemoryOrderStore::default();
        orders.reject_next_inserts_as_conflict(MAX_NUMBER_ATTEMPTS);

        let err = create_order(&orders, draft()).await;
        assert!(matches!(err, Err(RepositoryError::Conflict(_))));
        assert_eq!(orders.len(), 0);
    }
}
