//! Charged-but-unrecorded payments awaiting manual reconciliation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;
use crate::store::{ReconciliationLog, UnreconciledPayment};

#[derive(Debug, sqlx::FromRow)]
struct UnreconciledRow {
    authorization_id: String,
    amount_minor: i64,
    currency: String,
    customer_email: String,
    reason: String,
    created_at: DateTime<Utc>,
}

impl From<UnreconciledRow> for UnreconciledPayment {
    fn from(row: UnreconciledRow) -> Self {
        Self {
            authorization_id: row.authorization_id,
            amount_minor: row.amount_minor,
            currency: row.currency,
            customer_email: row.customer_email,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL`-backed [`ReconciliationLog`].
#[derive(Clone)]
pub struct PgReconciliationLog {
    pool: PgPool,
}

impl PgReconciliationLog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReconciliationLog for PgReconciliationLog {
    async fn record(&self, entry: &UnreconciledPayment) -> Result<(), RepositoryError> {
        // Re-recording the same authorization keeps the first reason.
        sqlx::query(
            r"
            INSERT INTO storefront.unreconciled_payment
                (authorization_id, amount_minor, currency, customer_email, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (authorization_id) DO NOTHING
            ",
        )
        .bind(&entry.authorization_id)
        .bind(entry.amount_minor)
        .bind(&entry.currency)
        .bind(&entry.customer_email)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<UnreconciledPayment>, RepositoryError> {
        let rows = sqlx::query_as::<_, UnreconciledRow>(
            r"
            SELECT authorization_id, amount_minor, currency, customer_email, reason, created_at
            FROM storefront.unreconciled_payment
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
