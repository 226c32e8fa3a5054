//! Checkout route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use larkspur_core::Email;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, set_current_customer};
use crate::models::CurrentCustomer;
use crate::services::cart::SessionCartStore;
use crate::services::checkout::{CheckoutRequest, Receipt};
use crate::state::AppState;
use crate::store::Backend;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub order: Receipt,
}

/// Run one checkout attempt for the session's cart.
///
/// POST /api/checkout
///
/// Post-order warnings (stock, notifications) are logged by the
/// orchestrator and never change the response.
#[instrument(skip_all, fields(signed_in = customer.is_some()))]
pub async fn submit<B: Backend>(
    State(state): State<AppState<B>>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let name = request.name.trim().to_owned();
    let email = request.email.clone();

    let store = SessionCartStore::new(session.clone());
    let outcome = state
        .checkout()
        .run(&store, customer.as_ref(), request)
        .await?;
    let receipt = outcome.receipt;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", receipt.order_number.as_str())]),
    );

    // Sign in the account created during this checkout.
    if let (Some(id), Ok(email)) = (receipt.customer_id, Email::parse(&email)) {
        let current = CurrentCustomer { id, email, name };
        if let Err(e) = set_current_customer(&session, &current).await {
            tracing::warn!(error = %e, "Could not sign in new customer");
        }
    }

    Ok(Json(CheckoutResponse {
        success: true,
        order: receipt,
    }))
}
