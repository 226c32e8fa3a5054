//! Persistence seams for the checkout pipeline.
//!
//! Each trait is one backing resource the pipeline touches. The `PostgreSQL`
//! implementations live in [`crate::db`]; in-memory implementations for tests
//! live in [`memory`] (behind the `testing` feature).
//!
//! A [`Backend`] bundles one implementation of every seam plus the payment
//! gateway and customer mailer, so services and routes are generic over a
//! single type parameter.

#[cfg(any(test, feature = "testing"))]
pub mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use larkspur_core::{
    AdminNotification, CustomerId, DecrementOutcome, Email, InventoryRecord, NewNotification,
    NotificationId, Order, OrderId, OrderStatus, PaymentStatus, ProductId, ProductSummary,
};

use crate::db::RepositoryError;
use crate::payments::PaymentGateway;
use crate::services::notifications::CustomerMailer;

/// Durable order records.
pub trait OrderStore: Clone + Send + Sync + 'static {
    /// Insert a complete order in a single write.
    ///
    /// Returns [`RepositoryError::Conflict`] if the order number is taken.
    fn insert(&self, order: &Order) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn get(&self, id: OrderId)
    -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn find_by_number(
        &self,
        order_number: &str,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Orders placed with `email` (case-insensitive), newest first.
    fn list_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// All orders, newest first.
    fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Hard delete. Returns `false` if no such order existed.
    fn delete(&self, id: OrderId) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn summary(&self) -> impl Future<Output = Result<OrderSummary, RepositoryError>> + Send;
}

/// Aggregate order figures for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub total_orders: u64,
    pub pending_orders: u64,
    /// Sum of totals for orders whose payment completed.
    pub revenue: Decimal,
}

/// Per-size stock rows.
pub trait InventoryStore: Clone + Send + Sync + 'static {
    /// All rows for a product.
    fn records(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Vec<InventoryRecord>, RepositoryError>> + Send;

    /// Quantity for one (product, size), or `None` if no row exists.
    fn quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
    ) -> impl Future<Output = Result<Option<u32>, RepositoryError>> + Send;

    /// Take `quantity` units atomically, clamping at zero when short.
    fn decrement(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> impl Future<Output = Result<DecrementOutcome, RepositoryError>> + Send;

    /// Overwrite (or create) a row.
    fn set_quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// The admin notification feed.
pub trait NotificationStore: Clone + Send + Sync + 'static {
    fn append(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<AdminNotification, RepositoryError>> + Send;

    /// Newest first; `since` restricts to entries created strictly after it.
    fn list(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AdminNotification>, RepositoryError>> + Send;

    /// Set `read = true`. Returns `false` if the id is unknown.
    fn mark_read(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn mark_all_read(&self) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    fn unread_count(&self) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Read-only product catalog.
pub trait Catalog: Clone + Send + Sync + 'static {
    fn product(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Option<ProductSummary>, RepositoryError>> + Send;
}

/// Customer accounts created inline at checkout.
pub trait CustomerDirectory: Clone + Send + Sync + 'static {
    /// Returns [`RepositoryError::Conflict`] if the email is registered.
    fn create(
        &self,
        email: &Email,
        name: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<CustomerId, RepositoryError>> + Send;
}

/// A payment the gateway confirmed but no order was written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreconciledPayment {
    pub authorization_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer_email: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Manual reconciliation queue for charged-but-unrecorded payments.
pub trait ReconciliationLog: Clone + Send + Sync + 'static {
    fn record(
        &self,
        entry: &UnreconciledPayment,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<UnreconciledPayment>, RepositoryError>> + Send;
}

/// One implementation of every collaborator the pipeline needs.
pub trait Backend: Clone + Send + Sync + 'static {
    type Orders: OrderStore;
    type Inventory: InventoryStore;
    type Notifications: NotificationStore;
    type Catalog: Catalog;
    type Customers: CustomerDirectory;
    type Reconciliation: ReconciliationLog;
    type Gateway: PaymentGateway;
    type Mailer: CustomerMailer;

    fn orders(&self) -> &Self::Orders;
    fn inventory(&self) -> &Self::Inventory;
    fn notifications(&self) -> &Self::Notifications;
    fn catalog(&self) -> &Self::Catalog;
    fn customers(&self) -> &Self::Customers;
    fn reconciliation(&self) -> &Self::Reconciliation;
    fn gateway(&self) -> &Self::Gateway;
    fn mailer(&self) -> &Self::Mailer;

    /// Whether the backing store is reachable (readiness probe).
    fn ping(&self) -> impl Future<Output = bool> + Send;
}
