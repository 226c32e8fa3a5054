//! Cart persistence and catalog-backed cart edits.
//!
//! A [`CartStore`] is owned by exactly one browsing session and is passed
//! explicitly to whatever needs the cart. The session-backed store keeps the
//! whole [`Cart`] snapshot under one session key and removes the key when the
//! cart becomes empty. The checkout owner key is written alongside the first
//! saved snapshot, so every request carrying the same session cookie sees the
//! same key before any checkout starts.

use std::future::Future;

use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use larkspur_core::{Cart, LineKey, ProductId};

use crate::db::RepositoryError;
use crate::models::session_keys;
use crate::store::Catalog;

/// Errors from loading or saving a cart.
#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Storage for one session's cart.
pub trait CartStore: Send + Sync {
    /// Current snapshot; an absent cart is an empty one.
    fn load(&self) -> impl Future<Output = Result<Cart, CartStoreError>> + Send;

    /// Replace the stored snapshot. An empty cart is removed from storage.
    fn save(&self, cart: &Cart) -> impl Future<Output = Result<(), CartStoreError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), CartStoreError>> + Send;

    /// Stable key identifying the owning session, used to refuse a second
    /// concurrent checkout for the same cart.
    fn owner_key(&self) -> impl Future<Output = Result<String, CartStoreError>> + Send;
}

/// [`CartStore`] over a `tower-sessions` session.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStore for SessionCartStore {
    async fn load(&self) -> Result<Cart, CartStoreError> {
        Ok(self
            .session
            .get::<Cart>(session_keys::CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        if cart.is_empty() {
            return self.clear().await;
        }
        self.session.insert(session_keys::CART, cart).await?;
        self.stored_owner_key().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CartStoreError> {
        self.session.remove::<Cart>(session_keys::CART).await?;
        Ok(())
    }

    async fn owner_key(&self) -> Result<String, CartStoreError> {
        self.stored_owner_key().await
    }
}

impl SessionCartStore {
    /// Read the owner key, minting it into the session when absent.
    async fn stored_owner_key(&self) -> Result<String, CartStoreError> {
        if let Some(key) = self
            .session
            .get::<String>(session_keys::CHECKOUT_OWNER)
            .await?
        {
            return Ok(key);
        }
        let key = Uuid::new_v4().to_string();
        self.session
            .insert(session_keys::CHECKOUT_OWNER, &key)
            .await?;
        Ok(key)
    }
}

/// Errors from catalog-backed cart edits.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found: {0}")]
    UnknownProduct(ProductId),

    #[error("{product} is not sold in size {size}")]
    UnknownSize { product: String, size: String },

    #[error("{0} is sold in one size only")]
    UnexpectedSize(String),

    #[error("line not in cart")]
    MissingLine,

    #[error(transparent)]
    Store(#[from] CartStoreError),

    #[error(transparent)]
    Catalog(#[from] RepositoryError),
}

/// Add `quantity` units of a catalog product to the stored cart.
///
/// Name and price come from the catalog. A sized product may be added without
/// a size; checkout refuses such lines until one is chosen.
#[instrument(skip(catalog, store, color), fields(product_id = %product_id))]
pub async fn add_item<C: Catalog, S: CartStore>(
    catalog: &C,
    store: &S,
    product_id: &ProductId,
    size: Option<String>,
    color: Option<String>,
    quantity: u32,
) -> Result<Cart, CartError> {
    let product = catalog
        .product(product_id)
        .await?
        .ok_or_else(|| CartError::UnknownProduct(product_id.clone()))?;

    if let Some(size) = size.as_deref() {
        if !product.requires_size() {
            return Err(CartError::UnexpectedSize(product.name));
        }
        if !product.sizes.iter().any(|s| s == size) {
            return Err(CartError::UnknownSize {
                product: product.name,
                size: size.to_owned(),
            });
        }
    }

    let mut cart = store.load().await?;
    cart.add_quantity(&product, size, color, quantity);
    store.save(&cart).await?;
    Ok(cart)
}

/// Set a line's quantity; `n <= 0` removes the line.
pub async fn set_quantity<S: CartStore>(store: &S, key: &LineKey, n: i64) -> Result<Cart, CartError> {
    let mut cart = store.load().await?;
    if !cart.set_quantity(key, n) {
        return Err(CartError::MissingLine);
    }
    store.save(&cart).await?;
    Ok(cart)
}

pub async fn remove_item<S: CartStore>(store: &S, key: &LineKey) -> Result<Cart, CartError> {
    let mut cart = store.load().await?;
    if !cart.remove(key) {
        return Err(CartError::MissingLine);
    }
    store.save(&cart).await?;
    Ok(cart)
}
