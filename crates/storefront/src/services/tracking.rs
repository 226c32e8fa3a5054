//! Guest order tracking.
//!
//! Order number plus email is the only thing guarding a guest's order, so a
//! lookup either matches on both or fails with one fixed message that does
//! not say which half was wrong.

use thiserror::Error;
use tracing::{debug, instrument};

use larkspur_core::{Order, OrderView};

use crate::db::RepositoryError;
use crate::store::OrderStore;

/// Message returned for every failed lookup.
pub const NOT_FOUND_MESSAGE: &str =
    "No order found with that order number and email address. Please check and try again.";

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("{NOT_FOUND_MESSAGE}")]
    NotFound,

    #[error("order number and email are required")]
    MissingInput,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Look up an order by exact order number and case-insensitive email.
///
/// # Errors
///
/// `TrackingError::NotFound` when the number is unknown or the email does not
/// match; the two cases are indistinguishable to the caller.
#[instrument(skip(orders, email))]
pub async fn track<O: OrderStore>(
    orders: &O,
    order_number: &str,
    email: &str,
) -> Result<OrderView, TrackingError> {
    let order_number = order_number.trim();
    let email = email.trim();
    if order_number.is_empty() || email.is_empty() {
        return Err(TrackingError::MissingInput);
    }

    let order = orders
        .find_by_number(order_number)
        .await?
        .filter(|o: &Order| o.customer_email.matches(email));

    order.map(|o| o.to_view()).ok_or_else(|| {
        debug!("Tracking lookup did not match");
        TrackingError::NotFound
    })
}
