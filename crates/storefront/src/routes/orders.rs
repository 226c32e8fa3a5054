//! Order lookup handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use larkspur_core::{Order, OrderView};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::tracking;
use crate::state::AppState;
use crate::store::{Backend, OrderStore};

/// Guest tracking query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuery {
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub order: OrderView,
}

#[derive(Debug, Serialize)]
pub struct AccountOrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// Look up an order by number and email.
///
/// GET /api/orders/track?orderNumber=&email=
///
/// A wrong email and an unknown number produce the same not-found response.
#[instrument(skip(state, query), fields(order_number = %query.order_number))]
pub async fn track<B: Backend>(
    State(state): State<AppState<B>>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<TrackResponse>> {
    let order = tracking::track(state.backend().orders(), &query.order_number, &query.email).await?;
    Ok(Json(TrackResponse {
        success: true,
        order,
    }))
}

/// Orders placed with the signed-in customer's email, newest first.
///
/// GET /api/account/orders
#[instrument(skip_all, fields(customer_id = %customer.id))]
pub async fn account_orders<B: Backend>(
    State(state): State<AppState<B>>,
    RequireAuth(customer): RequireAuth,
) -> Result<Json<AccountOrdersResponse>> {
    let orders = state.backend().orders().list_by_email(&customer.email).await?;
    Ok(Json(AccountOrdersResponse {
        success: true,
        orders,
    }))
}
