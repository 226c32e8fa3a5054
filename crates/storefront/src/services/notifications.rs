//! Notification dispatcher.
//!
//! Every paid order appends one entry to the admin feed and sends the
//! customer a confirmation email. Neither can fail the order: problems come
//! back as [`NotificationWarning`]s for the caller to log.

use std::future::Future;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use larkspur_core::{
    AdminNotification, Email, NewNotification, NotificationKind, NotificationSource, Order,
};

use crate::store::NotificationStore;

/// Errors that can occur when sending customer email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Transactional email to customers.
pub trait CustomerMailer: Clone + Send + Sync + 'static {
    fn send_order_confirmation(
        &self,
        order: &Order,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// Mailer that only logs. Used until a mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl CustomerMailer for LogMailer {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        info!(
            order_number = %order.order_number,
            to = %order.customer_email,
            total = %order.total,
            "Order confirmation email (not sent: no mail transport)"
        );
        Ok(())
    }
}

/// A failed best-effort notification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationWarning(pub String);

impl std::fmt::Display for NotificationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of [`notify_new_order`].
#[derive(Debug)]
pub struct Dispatched {
    pub notification: Option<AdminNotification>,
    pub warnings: Vec<NotificationWarning>,
    /// The detached confirmation email. Dropping it does not cancel the send.
    pub email: JoinHandle<()>,
}

fn new_order_entry(order: &Order) -> NewNotification {
    let items: u32 = order.items.iter().map(|i| i.quantity).sum();
    NewNotification {
        kind: NotificationKind::NewOrder,
        source: NotificationSource::from(order.order_type),
        title: format!("New order {}", order.order_number),
        message: format!(
            "{} placed a {} order: {items} item(s), total {}",
            order.customer_name, order.order_type, order.total
        ),
        order_id: Some(order.id),
        amount: Some(order.total),
    }
}

/// Append the admin "new order" entry and send the customer confirmation.
///
/// The email is sent on a detached task so a slow mail server never delays
/// the checkout response.
#[instrument(skip_all, fields(order_number = %order.order_number))]
pub async fn notify_new_order<N: NotificationStore, M: CustomerMailer>(
    notifications: &N,
    mailer: &M,
    order: &Order,
) -> Dispatched {
    let mut warnings = Vec::new();

    let notification = match notifications.append(new_order_entry(order)).await {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(error = %e, "Admin notification not recorded");
            warnings.push(NotificationWarning(format!("admin feed: {e}")));
            None
        }
    };

    let mailer = mailer.clone();
    let order = order.clone();
    let email = tokio::spawn(async move {
        if let Err(e) = mailer.send_order_confirmation(&order).await {
            warn!(order_number = %order.order_number, error = %e, "Confirmation email failed");
        }
    });

    Dispatched {
        notification,
        warnings,
        email,
    }
}

/// A message submitted through the public contact form.
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub body: String,
}

/// Append a "new contact message" entry to the admin feed.
///
/// # Errors
///
/// Returns the store error; there is no order riding on this call.
#[instrument(skip_all, fields(from = %message.email))]
pub async fn notify_contact_message<N: NotificationStore>(
    notifications: &N,
    message: &ContactMessage,
) -> Result<AdminNotification, crate::db::RepositoryError> {
    let preview: String = message.body.chars().take(140).collect();
    notifications
        .append(NewNotification {
            kind: NotificationKind::NewContactMessage,
            source: NotificationSource::ContactForm,
            title: format!("Message from {}: {}", message.name, message.subject),
            message: preview,
            order_id: None,
            amount: None,
        })
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use larkspur_core::{
        CustomerDetails, OrderDraft, OrderItem, OrderType, PaymentRecord, ProductId,
    };

    use super::*;
    use crate::store::memory::{MemoryNotificationStore, RecordingMailer};

    fn order() -> Order {
        let draft = OrderDraft {
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
                quantity: 2,
                price: Decimal::from_str("10.00").unwrap(),
                size: Some("38".to_owned()),
                color: None,
            }],
            payment: PaymentRecord {
                method: "card".to_owned(),
                reference: "pi_1".to_owned(),
                amount: Decimal::from_str("20.00").unwrap(),
            },
        };
        Order::from_draft(draft, "ORD-000001-001".to_owned(), Utc::now())
    }

    #[tokio::test]
    async fn test_new_order_appends_one_entry_and_emails() {
        let feed = MemoryNotificationStore::default();
        let mailer = RecordingMailer::default();
        let order = order();

        let dispatched = notify_new_order(&feed, &mailer, &order).await;
        dispatched.email.await.unwrap();

        assert!(dispatched.warnings.is_empty());
        let entry = dispatched.notification.unwrap();
        assert_eq!(entry.kind, NotificationKind::NewOrder);
        assert_eq!(entry.source, NotificationSource::GuestOrder);
        assert_eq!(entry.order_id, Some(order.id));
        assert_eq!(entry.amount, Some(order.total));
        assert!(!entry.read);
        assert_eq!(feed.list(None, 10).await.unwrap().len(), 1);
        assert_eq!(mailer.sent(), vec![order.order_number]);
    }

    #[tokio::test]
    async fn test_feed_failure_is_a_warning() {
        let feed = MemoryNotificationStore::default();
        feed.fail_writes(true);
        let mailer = RecordingMailer::default();

        let dispatched = notify_new_order(&feed, &mailer, &order()).await;
        dispatched.email.await.unwrap();

        assert!(dispatched.notification.is_none());
        assert_eq!(dispatched.warnings.len(), 1);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_email_failure_is_absorbed() {
        let feed = MemoryNotificationStore::default();
        let mailer = RecordingMailer::failing();

        let dispatched = notify_new_order(&feed, &mailer, &order()).await;
        dispatched.email.await.unwrap();

        assert!(dispatched.warnings.is_empty());
        assert!(dispatched.notification.is_some());
    }

    #[test]
    fn test_registered_order_source() {
        let mut order = order();
        order.order_type = OrderType::Registered;
        assert_eq!(
            new_order_entry(&order).source,
            NotificationSource::RegisteredOrder
        );
    }

    #[tokio::test]
    async fn test_contact_message_shares_the_feed() {
        let feed = MemoryNotificationStore::default();
        let message = ContactMessage {
            name: "Grace".to_owned(),
            email: Email::parse("grace@example.org").unwrap(),
            subject: "Sizing".to_owned(),
            body: "Do the runners fit narrow?".to_owned(),
        };

        let entry = notify_contact_message(&feed, &message).await.unwrap();
        assert_eq!(entry.kind, NotificationKind::NewContactMessage);
        assert_eq!(entry.source, NotificationSource::ContactForm);
        assert_eq!(feed.unread_count().await.unwrap(), 1);
    }
}
