//! Cart route handlers.
//!
//! The cart lives in the session. Every mutating handler returns the updated
//! cart so the client never has to re-fetch.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use larkspur_core::{Cart, CartLine, LineKey, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::services::cart::{self as cart_service, CartStore, SessionCartStore};
use crate::state::AppState;
use crate::store::Backend;

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub success: bool,
    pub items: Vec<CartLine>,
    pub item_count: u32,
    pub total: Decimal,
    /// Some line still needs a size before checkout.
    pub needs_size: bool,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            success: true,
            item_count: cart.item_count(),
            total: cart.total(),
            needs_size: cart.has_unsized_lines(),
            items: cart.lines().to_vec(),
        }
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: i64,
}

/// Remove line request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
}

/// Show the cart.
///
/// GET /api/cart
pub async fn show<B: Backend>(
    State(_state): State<AppState<B>>,
    session: Session,
) -> Result<Json<CartResponse>> {
    let cart = SessionCartStore::new(session).load().await?;
    Ok(Json(cart.into()))
}

/// Add a product to the cart.
///
/// POST /api/cart/add
#[instrument(skip(state, session), fields(product_id = %body.product_id))]
pub async fn add<B: Backend>(
    State(state): State<AppState<B>>,
    session: Session,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>> {
    if body.quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_owned()));
    }

    let store = SessionCartStore::new(session);
    let cart = cart_service::add_item(
        state.backend().catalog(),
        &store,
        &body.product_id,
        body.size,
        body.color,
        body.quantity,
    )
    .await?;

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", body.product_id.as_str())]),
    );
    Ok(Json(cart.into()))
}

/// Set the quantity of one line. Zero or less removes it.
///
/// POST /api/cart/update
#[instrument(skip(_state, session), fields(product_id = %body.product_id))]
pub async fn update<B: Backend>(
    State(_state): State<AppState<B>>,
    session: Session,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<CartResponse>> {
    let key = LineKey::new(body.product_id, body.size.as_deref());
    let cart =
        cart_service::set_quantity(&SessionCartStore::new(session), &key, body.quantity).await?;
    Ok(Json(cart.into()))
}

/// Remove one line.
///
/// POST /api/cart/remove
#[instrument(skip(_state, session), fields(product_id = %body.product_id))]
pub async fn remove<B: Backend>(
    State(_state): State<AppState<B>>,
    session: Session,
    Json(body): Json<RemoveFromCartRequest>,
) -> Result<Json<CartResponse>> {
    let key = LineKey::new(body.product_id, body.size.as_deref());
    let cart = cart_service::remove_item(&SessionCartStore::new(session), &key).await?;
    Ok(Json(cart.into()))
}

/// Empty the cart.
///
/// POST /api/cart/clear
pub async fn clear<B: Backend>(
    State(_state): State<AppState<B>>,
    session: Session,
) -> Result<Json<CartResponse>> {
    SessionCartStore::new(session).clear().await?;
    Ok(Json(Cart::new().into()))
}
