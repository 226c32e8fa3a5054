//! Admin notification feed entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{NotificationId, NotificationKind, NotificationSource, OrderId};

/// One entry in the admin notification feed.
///
/// Entries are append-only; the only mutation is `read` going from `false` to
/// `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNotification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub source: NotificationSource,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub order_id: Option<OrderId>,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending to the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub source: NotificationSource,
    pub title: String,
    pub message: String,
    pub order_id: Option<OrderId>,
    pub amount: Option<Decimal>,
}

impl NewNotification {
    /// Materialize the feed entry with a fresh id, unread.
    #[must_use]
    pub fn into_notification(self, created_at: DateTime<Utc>) -> AdminNotification {
        AdminNotification {
            id: NotificationId::new(),
            kind: self.kind,
            source: self.source,
            title: self.title,
            message: self.message,
            read: false,
            order_id: self.order_id,
            amount: self.amount,
            created_at,
        }
    }
}
