//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use larkspur_core::ProductId;

use crate::error::{AppError, Result};
use crate::services::inventory;
use crate::state::AppState;
use crate::store::{Backend, Catalog};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizesResponse {
    pub success: bool,
    pub product_id: ProductId,
    /// Sizes with at least one unit in stock.
    pub sizes: Vec<String>,
    /// Set for one-size products; `None` when no stock row exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
}

/// Sizes currently in stock for a product.
///
/// GET /api/products/{id}/sizes
///
/// Lookup failures yield an empty list rather than an error so the product
/// page shows "sold out" instead of offering stock that may not exist.
#[instrument(skip(state))]
pub async fn sizes<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Json<SizesResponse>> {
    let product_id = ProductId::new(id);
    let product = state
        .backend()
        .catalog()
        .product(&product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    let stock = state.backend().inventory();
    let (sizes, in_stock) = if product.requires_size() {
        (inventory::available_sizes(stock, &product_id).await, None)
    } else {
        (Vec::new(), inventory::in_stock(stock, &product_id).await)
    };
    Ok(Json(SizesResponse {
        success: true,
        product_id,
        sizes,
        in_stock,
    }))
}
