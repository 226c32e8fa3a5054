//! Admin notification feed repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use larkspur_core::{
    AdminNotification, NewNotification, NotificationId, NotificationKind, NotificationSource,
    OrderId,
};

use super::RepositoryError;
use crate::store::NotificationStore;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: NotificationId,
    kind: NotificationKind,
    source: NotificationSource,
    title: String,
    message: String,
    read: bool,
    order_id: Option<OrderId>,
    amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for AdminNotification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            source: row.source,
            title: row.title,
            message: row.message,
            read: row.read,
            order_id: row.order_id,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL`-backed [`NotificationStore`].
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationStore for PgNotificationStore {
    async fn append(
        &self,
        notification: NewNotification,
    ) -> Result<AdminNotification, RepositoryError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r"
            INSERT INTO storefront.admin_notification
                (id, kind, source, title, message, order_id, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, kind, source, title, message, read, order_id, amount, created_at
            ",
        )
        .bind(NotificationId::new())
        .bind(notification.kind)
        .bind(notification.source)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.order_id)
        .bind(notification.amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AdminNotification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r"
            SELECT id, kind, source, title, message, read, order_id, amount, created_at
            FROM storefront.admin_notification
            WHERE $1::timestamptz IS NULL OR created_at > $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.admin_notification SET read = TRUE WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.admin_notification SET read = TRUE WHERE read = FALSE",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storefront.admin_notification WHERE read = FALSE",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }
}
