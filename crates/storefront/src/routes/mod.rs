//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (backing store reachable)
//!
//! # Cart (session-scoped)
//! GET  /api/cart               - Current cart
//! POST /api/cart/add           - Add a product (price comes from the catalog)
//! POST /api/cart/update        - Set a line's quantity (0 or less removes it)
//! POST /api/cart/remove        - Remove a line
//! POST /api/cart/clear         - Empty the cart
//!
//! # Catalog
//! GET  /api/products/{id}/sizes - Sizes with stock
//!
//! # Checkout
//! POST /api/checkout           - Run one checkout attempt
//!
//! # Orders
//! GET  /api/orders/track       - Guest lookup by order number + email
//! GET  /api/account/orders     - Orders for the signed-in customer
//! POST /api/contact            - Contact form (lands in the admin feed)
//!
//! # Admin API (bearer token)
//! GET    /admin/api/orders                       - Paginated order list
//! GET    /admin/api/orders/{id}                  - Order detail
//! POST   /admin/api/orders/{id}/status           - Fulfillment status
//! POST   /admin/api/orders/{id}/payment-status   - Payment status
//! DELETE /admin/api/orders/{id}                  - Hard delete
//! GET    /admin/api/notifications                - Feed (optional ?since=)
//! POST   /admin/api/notifications/{id}/read      - Mark one read
//! POST   /admin/api/notifications/read-all       - Mark all read
//! GET    /admin/api/dashboard                    - Counts and revenue
//! ```

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod health;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, checkout_rate_limiter, tracking_rate_limiter};
use crate::state::AppState;
use crate::store::Backend;

/// Create the cart routes router.
pub fn cart_routes<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/", get(cart::show::<B>))
        .route("/add", post(cart::add::<B>))
        .route("/update", post(cart::update::<B>))
        .route("/remove", post(cart::remove::<B>))
        .route("/clear", post(cart::clear::<B>))
}

/// Create the shopper-facing API router.
pub fn api_routes<B: Backend>() -> Router<AppState<B>> {
    let checkout = Router::new()
        .route("/checkout", post(checkout::submit::<B>))
        .layer(checkout_rate_limiter());

    let tracking = Router::new()
        .route("/orders/track", get(orders::track::<B>))
        .layer(tracking_rate_limiter());

    let general = Router::new()
        .nest("/cart", cart_routes())
        .route("/products/{id}/sizes", get(products::sizes::<B>))
        .route("/account/orders", get(orders::account_orders::<B>))
        .route("/contact", post(contact::submit::<B>))
        .layer(api_rate_limiter());

    Router::new().merge(checkout).merge(tracking).merge(general)
}

/// Create the admin API router.
pub fn admin_routes<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/orders", get(admin::list_orders::<B>))
        .route(
            "/orders/{id}",
            get(admin::order_detail::<B>).delete(admin::delete_order::<B>),
        )
        .route("/orders/{id}/status", post(admin::update_status::<B>))
        .route(
            "/orders/{id}/payment-status",
            post(admin::update_payment_status::<B>),
        )
        .route("/notifications", get(admin::notifications::<B>))
        .route(
            "/notifications/{id}/read",
            post(admin::mark_notification_read::<B>),
        )
        .route(
            "/notifications/read-all",
            post(admin::mark_all_notifications_read::<B>),
        )
        .route("/dashboard", get(admin::dashboard::<B>))
}

/// Create all routes for the storefront.
pub fn routes<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<B>))
        .nest("/api", api_routes())
        .nest("/admin/api", admin_routes())
}
