//! Session-related types.
//!
//! Types stored in the session for the shopper's identity and cart.

use serde::{Deserialize, Serialize};

use larkspur_core::{CustomerId, Email};

/// Session-stored customer identity.
///
/// Minimal data stored in the session to identify the signed-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Customer's database ID.
    pub id: CustomerId,
    /// Customer's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the cart snapshot.
    pub const CART: &str = "cart";

    /// Key for the random id that identifies this session's checkout.
    pub const CHECKOUT_OWNER: &str = "checkout_owner";
}
