//! Order repository.
//!
//! Orders are one row each with the purchased items embedded as JSONB, so an
//! order is written by a single `INSERT` and a reader sees either nothing or
//! the complete order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use larkspur_core::{
    CustomerId, Email, Order, OrderId, OrderItem, OrderStatus, OrderType, PaymentStatus,
};

use super::{RepositoryError, conflict_on_unique};
use crate::store::{OrderStore, OrderSummary};

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer_id, customer_name, customer_email, customer_phone,
    customer_address, items, total, status, order_type, payment_status,
    payment_method, payment_reference, payment_amount, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Option<Uuid>,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_address: String,
    items: Json<Vec<OrderItem>>,
    total: Decimal,
    status: OrderStatus,
    order_type: OrderType,
    payment_status: PaymentStatus,
    payment_method: String,
    payment_reference: String,
    payment_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::from_uuid(row.id),
            order_number: row.order_number,
            customer_id: row.customer_id.map(CustomerId::from_uuid),
            customer_name: row.customer_name,
            customer_email,
            customer_phone: row.customer_phone,
            customer_address: row.customer_address,
            items: row.items.0,
            total: row.total,
            status: row.status,
            order_type: row.order_type,
            payment_status: row.payment_status,
            payment_method: row.payment_method,
            payment_reference: row.payment_reference,
            payment_amount: row.payment_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// `PostgreSQL`-backed [`OrderStore`].
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO storefront."order" (
                id, order_number, customer_id, customer_name, customer_email,
                customer_phone, customer_address, items, total, status, order_type,
                payment_status, payment_method, payment_reference, payment_amount,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.customer_address)
        .bind(Json(&order.items))
        .bind(order.total)
        .bind(order.status)
        .bind(order.order_type)
        .bind(order.payment_status)
        .bind(&order.payment_method)
        .bind(&order.payment_reference)
        .bind(order.payment_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "order number"))?;

        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE order_number = $1"#
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM storefront."order"
            WHERE lower(customer_email) = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(email.normalized())
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM storefront."order"
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE storefront."order"
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE storefront."order"
            SET payment_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r#"DELETE FROM storefront."order" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn summary(&self) -> Result<OrderSummary, RepositoryError> {
        let (total_orders, pending_orders, revenue): (i64, i64, Option<Decimal>) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'pending'),
                    SUM(total) FILTER (WHERE payment_status = 'completed')
                FROM storefront."order"
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(OrderSummary {
            total_orders: u64::try_from(total_orders).unwrap_or_default(),
            pending_orders: u64::try_from(pending_orders).unwrap_or_default(),
            revenue: revenue.unwrap_or_default(),
        })
    }
}
