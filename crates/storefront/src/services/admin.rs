//! Back-office order management and dashboard.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use larkspur_core::{Order, OrderId, OrderStatus, PaymentStatus};

use crate::db::RepositoryError;
use crate::store::{NotificationStore, OrderStore, OrderSummary};

/// Largest page the order list will return.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Page through orders, newest first.
pub async fn list_orders<O: OrderStore>(
    orders: &O,
    limit: u32,
    offset: u32,
) -> Result<Vec<Order>, AdminError> {
    Ok(orders.list(limit.clamp(1, MAX_PAGE_SIZE), offset).await?)
}

pub async fn get_order<O: OrderStore>(orders: &O, id: OrderId) -> Result<Order, AdminError> {
    orders.get(id).await?.ok_or(AdminError::NotFound)
}

/// Move an order to `next`, enforcing the fulfillment state machine.
///
/// Setting the current status again is accepted and leaves the order as is.
#[instrument(skip(orders))]
pub async fn update_status<O: OrderStore>(
    orders: &O,
    id: OrderId,
    next: OrderStatus,
) -> Result<Order, AdminError> {
    let current = get_order(orders, id).await?;
    if current.status == next {
        return Ok(current);
    }
    if !current.status.can_transition_to(next) {
        return Err(AdminError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    let updated = orders
        .update_status(id, next)
        .await?
        .ok_or(AdminError::NotFound)?;
    info!(order_number = %updated.order_number, from = %current.status, to = %next, "Order status updated");
    Ok(updated)
}

/// Record a payment status change (e.g. a refund marked failed).
#[instrument(skip(orders))]
pub async fn update_payment_status<O: OrderStore>(
    orders: &O,
    id: OrderId,
    status: PaymentStatus,
) -> Result<Order, AdminError> {
    orders
        .update_payment_status(id, status)
        .await?
        .ok_or(AdminError::NotFound)
}

#[instrument(skip(orders))]
pub async fn delete_order<O: OrderStore>(orders: &O, id: OrderId) -> Result<(), AdminError> {
    if orders.delete(id).await? {
        info!(order_id = %id, "Order deleted");
        Ok(())
    } else {
        Err(AdminError::NotFound)
    }
}

/// Figures shown on the admin landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub orders: OrderSummary,
    pub unread_notifications: u64,
}

pub async fn dashboard<O: OrderStore, N: NotificationStore>(
    orders: &O,
    notifications: &N,
) -> Result<Dashboard, AdminError> {
    Ok(Dashboard {
        orders: orders.summary().await?,
        unread_notifications: notifications.unread_count().await?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use larkspur_core::{
        CustomerDetails, Email, NewNotification, NotificationKind, NotificationSource, OrderDraft,
        OrderItem, PaymentRecord, ProductId,
    };

    use super::*;
    use crate::store::memory::{MemoryNotificationStore, MemoryOrderStore};

    async fn seeded(total: &str) -> (MemoryOrderStore, Order) {
        let orders = MemoryOrderStore::default();
        let order = Order::from_draft(
            OrderDraft {
                customer: CustomerDetails {
                    name: "Ada".to_owned(),
                    email: Email::parse("ada@example.com").unwrap(),
                    phone: String::new(),
                    address: String::new(),
                },
                customer_id: None,
                items: vec![OrderItem {
                    product_id: ProductId::new("P1"),
                    name: "Trail Runner".to_owned(),
                    quantity: 1,
                    price: Decimal::from_str(total).unwrap(),
                    size: None,
                    color: None,
                }],
                payment: PaymentRecord {
                    method: "card".to_owned(),
                    reference: "pi_1".to_owned(),
                    amount: Decimal::from_str(total).unwrap(),
                },
            },
            "ORD-000001-001".to_owned(),
            Utc::now(),
        );
        orders.insert(&order).await.unwrap();
        (orders, order)
    }

    #[tokio::test]
    async fn test_status_walks_forward() {
        let (orders, order) = seeded("10").await;
        let o = update_status(&orders, order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(o.status, OrderStatus::Processing);
        let o = update_status(&orders, order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(o.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_status_rejects_skips_and_reversals() {
        let (orders, order) = seeded("10").await;
        assert!(matches!(
            update_status(&orders, order.id, OrderStatus::Completed).await,
            Err(AdminError::InvalidTransition { .. })
        ));

        update_status(&orders, order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            update_status(&orders, order.id, OrderStatus::Processing).await,
            Err(AdminError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_hard() {
        let (orders, order) = seeded("10").await;
        delete_order(&orders, order.id).await.unwrap();
        assert!(matches!(
            get_order(&orders, order.id).await,
            Err(AdminError::NotFound)
        ));
        assert!(matches!(
            delete_order(&orders, order.id).await,
            Err(AdminError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_dashboard() {
        let (orders, _) = seeded("57.50").await;
        let feed = MemoryNotificationStore::default();
        feed.append(NewNotification {
            kind: NotificationKind::NewOrder,
            source: NotificationSource::GuestOrder,
            title: "New order".to_owned(),
            message: String::new(),
            order_id: None,
            amount: None,
        })
        .await
        .unwrap();

        let d = dashboard(&orders, &feed).await.unwrap();
        assert_eq!(d.orders.total_orders, 1);
        assert_eq!(d.orders.pending_orders, 1);
        assert_eq!(d.orders.revenue, Decimal::from_str("57.50").unwrap());
        assert_eq!(d.unread_notifications, 1);
    }
}
