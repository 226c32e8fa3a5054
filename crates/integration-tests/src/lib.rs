//! Integration tests for Larkspur.
//!
//! Tests drive the storefront library end to end against the in-memory
//! backend (`larkspur-storefront` with the `testing` feature) and the scripted
//! payment gateway. No database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p larkspur-integration-tests
//! ```
//!
//! # Test Files
//!
//! - `checkout_pipeline` - Checkout orchestrator against shared stores
//! - `http_api` - Routes through the full axum router via `oneshot`

use std::str::FromStr;

use axum::Router;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tower_sessions::MemoryStore;

use larkspur_core::{CurrencyCode, ProductId, ProductSummary};
use larkspur_storefront::{
    config::{PaymentConfig, SentryConfig, StorefrontConfig},
    middleware::session_layer,
    services::checkout::CheckoutRequest,
    state::AppState,
    store::{Backend, InventoryStore, memory::MemoryBackend},
};

/// Admin bearer token used by [`test_config`].
pub const ADMIN_TOKEN: &str = "kT9#vQ2mZr4xWp7LbN3s";

/// A configuration that never touches the environment.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/larkspur_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("0123456789abcdefghijklmnopqrstuvwxyz"),
        admin_token: SecretString::from(ADMIN_TOKEN),
        payment: PaymentConfig {
            api_base: "http://localhost:12111".to_owned(),
            secret_key: SecretString::from("sk_test_unused"),
        },
        currency: CurrencyCode::USD,
        sentry: SentryConfig::default(),
    }
}

/// Parse a decimal literal.
///
/// # Panics
///
/// Panics on an invalid literal; fixtures only.
#[must_use]
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_else(|e| panic!("bad decimal {s}: {e}"))
}

/// The sized shoe from the worked example: P1 at 57.50 in size 38.
#[must_use]
pub fn trail_runner() -> ProductSummary {
    ProductSummary {
        id: ProductId::new("P1"),
        name: "Trail Runner".to_owned(),
        price: dec("57.50"),
        category: "shoes".to_owned(),
        sizes: vec!["38".to_owned(), "39".to_owned()],
        image_ref: Some("p1.jpg".to_owned()),
    }
}

/// A one-size product.
#[must_use]
pub fn canvas_tote() -> ProductSummary {
    ProductSummary {
        id: ProductId::new("BAG-01"),
        name: "Canvas Tote".to_owned(),
        price: dec("24.00"),
        category: "bags".to_owned(),
        sizes: Vec::new(),
        image_ref: None,
    }
}

/// A backend stocked with [`trail_runner`] (size 38: `shoe_stock`, size 39: 0)
/// and [`canvas_tote`] (5 units).
///
/// # Panics
///
/// Never in practice: the in-memory stores do not fail unless told to.
pub async fn seeded_backend(shoe_stock: u32) -> MemoryBackend {
    let backend = MemoryBackend::default();
    let shoe = trail_runner();
    let tote = canvas_tote();
    backend.catalog().insert(shoe.clone());
    backend.catalog().insert(tote.clone());

    let inventory = backend.inventory();
    for (product, size, quantity) in [
        (&shoe.id, Some("38"), shoe_stock),
        (&shoe.id, Some("39"), 0),
        (&tote.id, None, 5),
    ] {
        inventory
            .set_quantity(product, size, quantity)
            .await
            .unwrap_or_else(|e| panic!("seed inventory: {e}"));
    }
    backend
}

/// A complete guest checkout form for `email`.
#[must_use]
pub fn checkout_request(email: &str) -> CheckoutRequest {
    CheckoutRequest {
        name: "Ada Lovelace".to_owned(),
        email: email.to_owned(),
        phone: "555-0100".to_owned(),
        address: "1 Analytical Way, London".to_owned(),
        payment_method: "pm_card_visa".to_owned(),
        create_account_password: None,
    }
}

/// The full router over `backend`, with in-memory sessions.
#[must_use]
pub fn test_app(backend: MemoryBackend) -> Router {
    let config = test_config();
    let sessions = session_layer(MemoryStore::default(), &config);
    larkspur_storefront::app(AppState::new(config, backend), sessions)
}
