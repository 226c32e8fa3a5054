//! In-memory stores for tests.
//!
//! Each store is a cheap `Arc<Mutex<..>>` handle, so clones share state the
//! way clones of a `PgPool` do. Mutations happen under one lock, which makes
//! the inventory decrement atomic. Failure switches let tests exercise the
//! error paths a real database would hit.

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use chrono::{DateTime, Utc};

use larkspur_core::{
    AdminNotification, Cart, CustomerId, DecrementOutcome, Email, InventoryRecord,
    NewNotification, NotificationId, Order, OrderId, OrderStatus, PaymentStatus, ProductId,
    ProductSummary,
};

use super::{
    Backend, Catalog, CustomerDirectory, InventoryStore, NotificationStore, OrderStore,
    OrderSummary, ReconciliationLog, UnreconciledPayment,
};
use crate::db::RepositoryError;
use crate::payments::scripted::ScriptedGateway;
use crate::services::cart::{CartStore, CartStoreError};
use crate::services::notifications::{CustomerMailer, EmailError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The error an unreachable database produces.
fn unavailable() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<Mutex<Vec<Order>>>,
    fail_writes: Arc<AtomicBool>,
    conflicts: Arc<AtomicUsize>,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.orders).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every insert fail as if the database were down.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Report the next `n` inserts as order-number collisions.
    pub fn reject_next_inserts_as_conflict(&self, n: usize) {
        self.conflicts.store(n, Ordering::SeqCst);
    }

    fn update<F: FnOnce(&mut Order)>(&self, id: OrderId, f: F) -> Option<Order> {
        let mut orders = lock(&self.orders);
        let order = orders.iter_mut().find(|o| o.id == id)?;
        f(order);
        order.updated_at = Utc::now();
        Some(order.clone())
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        if self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RepositoryError::Conflict(
                "order number already exists".to_owned(),
            ));
        }

        let mut orders = lock(&self.orders);
        if orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(RepositoryError::Conflict(
                "order number already exists".to_owned(),
            ));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.orders).iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.orders)
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let matching = lock(&self.orders)
            .iter()
            .filter(|o| o.customer_email.matches(email.as_str()))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Order>, RepositoryError> {
        let all = newest_first(lock(&self.orders).clone());
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self.update(id, |o| o.status = status))
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self.update(id, |o| o.payment_status = status))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut orders = lock(&self.orders);
        let before = orders.len();
        orders.retain(|o| o.id != id);
        Ok(orders.len() != before)
    }

    async fn summary(&self) -> Result<OrderSummary, RepositoryError> {
        let orders = lock(&self.orders);
        Ok(OrderSummary {
            total_orders: orders.len() as u64,
            pending_orders: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Pending)
                .count() as u64,
            revenue: orders
                .iter()
                .filter(|o| o.payment_status == PaymentStatus::Completed)
                .map(|o| o.total)
                .sum(),
        })
    }
}

// =============================================================================
// Inventory
// =============================================================================

type InventoryKey = (ProductId, String);

#[derive(Clone, Default)]
pub struct MemoryInventoryStore {
    rows: Arc<Mutex<HashMap<InventoryKey, u32>>>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryInventoryStore {
    /// Make `records` and `quantity` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn key(product_id: &ProductId, size: Option<&str>) -> InventoryKey {
        (product_id.clone(), size.unwrap_or_default().to_owned())
    }

    fn check_reads(&self) -> Result<(), RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

impl InventoryStore for MemoryInventoryStore {
    async fn records(&self, product_id: &ProductId) -> Result<Vec<InventoryRecord>, RepositoryError> {
        self.check_reads()?;
        let mut records: Vec<InventoryRecord> = lock(&self.rows)
            .iter()
            .filter(|((id, _), _)| id == product_id)
            .map(|((id, size), quantity)| InventoryRecord {
                product_id: id.clone(),
                size: (!size.is_empty()).then(|| size.clone()),
                quantity: *quantity,
            })
            .collect();
        records.sort_by(|a, b| a.size.cmp(&b.size));
        Ok(records)
    }

    async fn quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
    ) -> Result<Option<u32>, RepositoryError> {
        self.check_reads()?;
        Ok(lock(&self.rows).get(&Self::key(product_id, size)).copied())
    }

    async fn decrement(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let mut rows = lock(&self.rows);
        let Some(current) = rows.get_mut(&Self::key(product_id, size)) else {
            return Ok(DecrementOutcome::Missing);
        };
        let available = *current;
        *current = available.saturating_sub(quantity);
        if available >= quantity {
            Ok(DecrementOutcome::Applied {
                remaining: *current,
            })
        } else {
            Ok(DecrementOutcome::Clamped {
                requested: quantity,
                available,
            })
        }
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        lock(&self.rows).insert(Self::key(product_id, size), quantity);
        Ok(())
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryNotificationStore {
    entries: Arc<Mutex<Vec<AdminNotification>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryNotificationStore {
    /// Make `append` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl NotificationStore for MemoryNotificationStore {
    async fn append(
        &self,
        notification: NewNotification,
    ) -> Result<AdminNotification, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let entry = notification.into_notification(Utc::now());
        lock(&self.entries).push(entry.clone());
        Ok(entry)
    }

    async fn list(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AdminNotification>, RepositoryError> {
        let mut entries: Vec<AdminNotification> = lock(&self.entries)
            .iter()
            .filter(|n| since.is_none_or(|s| n.created_at > s))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn mark_read(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        let mut entries = lock(&self.entries);
        match entries.iter_mut().find(|n| n.id == id) {
            Some(entry) => {
                entry.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self) -> Result<u64, RepositoryError> {
        let mut changed = 0;
        for entry in lock(&self.entries).iter_mut().filter(|n| !n.read) {
            entry.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn unread_count(&self) -> Result<u64, RepositoryError> {
        Ok(lock(&self.entries).iter().filter(|n| !n.read).count() as u64)
    }
}

// =============================================================================
// Catalog, customers, reconciliation
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<Mutex<HashMap<ProductId, ProductSummary>>>,
}

impl MemoryCatalog {
    pub fn insert(&self, product: ProductSummary) {
        lock(&self.products).insert(product.id.clone(), product);
    }
}

impl Catalog for MemoryCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<ProductSummary>, RepositoryError> {
        Ok(lock(&self.products).get(id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCustomerDirectory {
    customers: Arc<Mutex<Vec<(CustomerId, Email, String)>>>,
}

impl MemoryCustomerDirectory {
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.customers).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CustomerDirectory for MemoryCustomerDirectory {
    async fn create(
        &self,
        email: &Email,
        _name: &str,
        password_hash: &str,
    ) -> Result<CustomerId, RepositoryError> {
        let mut customers = lock(&self.customers);
        if customers.iter().any(|(_, e, _)| e.matches(email.as_str())) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let id = CustomerId::new();
        customers.push((id, email.clone(), password_hash.to_owned()));
        Ok(id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryReconciliationLog {
    entries: Arc<Mutex<Vec<UnreconciledPayment>>>,
}

impl ReconciliationLog for MemoryReconciliationLog {
    async fn record(&self, entry: &UnreconciledPayment) -> Result<(), RepositoryError> {
        let mut entries = lock(&self.entries);
        if !entries
            .iter()
            .any(|e| e.authorization_id == entry.authorization_id)
        {
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UnreconciledPayment>, RepositoryError> {
        Ok(lock(&self.entries).clone())
    }
}

// =============================================================================
// Mailer
// =============================================================================

/// Records confirmation emails by order number.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingMailer {
    /// A mailer whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }
}

impl CustomerMailer for RecordingMailer {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Transport("connection refused".to_owned()));
        }
        lock(&self.sent).push(order.order_number.clone());
        Ok(())
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A cart owned by one simulated session.
#[derive(Clone)]
pub struct MemoryCartStore {
    cart: Arc<Mutex<Option<Cart>>>,
    owner: String,
}

impl Default for MemoryCartStore {
    fn default() -> Self {
        Self {
            cart: Arc::default(),
            owner: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl MemoryCartStore {
    /// Whether a snapshot is currently stored.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        lock(&self.cart).is_some()
    }
}

impl CartStore for MemoryCartStore {
    async fn load(&self) -> Result<Cart, CartStoreError> {
        Ok(lock(&self.cart).clone().unwrap_or_default())
    }

    async fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        *lock(&self.cart) = (!cart.is_empty()).then(|| cart.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CartStoreError> {
        *lock(&self.cart) = None;
        Ok(())
    }

    async fn owner_key(&self) -> Result<String, CartStoreError> {
        Ok(self.owner.clone())
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Every store in memory, a scripted gateway, and a recording mailer.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    orders: MemoryOrderStore,
    inventory: MemoryInventoryStore,
    notifications: MemoryNotificationStore,
    catalog: MemoryCatalog,
    customers: MemoryCustomerDirectory,
    reconciliation: MemoryReconciliationLog,
    gateway: ScriptedGateway,
    mailer: RecordingMailer,
    offline: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Make the readiness probe report the store as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Backend for MemoryBackend {
    type Orders = MemoryOrderStore;
    type Inventory = MemoryInventoryStore;
    type Notifications = MemoryNotificationStore;
    type Catalog = MemoryCatalog;
    type Customers = MemoryCustomerDirectory;
    type Reconciliation = MemoryReconciliationLog;
    type Gateway = ScriptedGateway;
    type Mailer = RecordingMailer;

    fn orders(&self) -> &Self::Orders {
        &self.orders
    }

    fn inventory(&self) -> &Self::Inventory {
        &self.inventory
    }

    fn notifications(&self) -> &Self::Notifications {
        &self.notifications
    }

    fn catalog(&self) -> &Self::Catalog {
        &self.catalog
    }

    fn customers(&self) -> &Self::Customers {
        &self.customers
    }

    fn reconciliation(&self) -> &Self::Reconciliation {
        &self.reconciliation
    }

    fn gateway(&self) -> &Self::Gateway {
        &self.gateway
    }

    fn mailer(&self) -> &Self::Mailer {
        &self.mailer
    }

    async fn ping(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}
