//! `PostgreSQL` repositories for the storefront.
//!
//! # Database: `larkspur`
//!
//! ## Tables (schema `storefront`)
//!
//! - `product` - Catalog read model (prices, sizes)
//! - `inventory` - One row per (product, size); `quantity >= 0` enforced by a CHECK
//! - `customer` - Accounts created at checkout
//! - `order` - Orders with items embedded as JSONB
//! - `admin_notification` - Single admin feed for every notification source
//! - `unreconciled_payment` - Charges that succeeded without an order row
//!
//! Sessions live in the `tower_sessions` schema managed by
//! `tower-sessions-sqlx-store`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p larkspur-cli -- migrate
//! ```

pub mod catalog;
pub mod customers;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod reconciliation;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::PgCatalog;
pub use customers::PgCustomerDirectory;
pub use inventory::PgInventoryStore;
pub use notifications::PgNotificationStore;
pub use orders::PgOrderStore;
pub use reconciliation::PgReconciliationLog;

use crate::config::StorefrontConfig;
use crate::payments::StripeClient;
use crate::services::notifications::LogMailer;
use crate::store::Backend;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to [`RepositoryError::Conflict`].
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Convert a non-negative database integer to `u32`.
fn to_u32(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a quantity to the database's `INTEGER`.
fn to_i32(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {value} is out of range")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Production backend: every store on one `PostgreSQL` pool, Stripe for
/// payments, and the logging mailer for customer email.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    orders: PgOrderStore,
    inventory: PgInventoryStore,
    notifications: PgNotificationStore,
    catalog: PgCatalog,
    customers: PgCustomerDirectory,
    reconciliation: PgReconciliationLog,
    gateway: StripeClient,
    mailer: LogMailer,
}

impl PgBackend {
    #[must_use]
    pub fn new(pool: PgPool, config: &StorefrontConfig) -> Self {
        Self {
            orders: PgOrderStore::new(pool.clone()),
            inventory: PgInventoryStore::new(pool.clone()),
            notifications: PgNotificationStore::new(pool.clone()),
            catalog: PgCatalog::new(pool.clone()),
            customers: PgCustomerDirectory::new(pool.clone()),
            reconciliation: PgReconciliationLog::new(pool.clone()),
            gateway: StripeClient::new(&config.payment),
            mailer: LogMailer,
            pool,
        }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Backend for PgBackend {
    type Orders = PgOrderStore;
    type Inventory = PgInventoryStore;
    type Notifications = PgNotificationStore;
    type Catalog = PgCatalog;
    type Customers = PgCustomerDirectory;
    type Reconciliation = PgReconciliationLog;
    type Gateway = StripeClient;
    type Mailer = LogMailer;

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
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
