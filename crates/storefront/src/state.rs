//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::PgBackend;
use crate::services::checkout::Checkout;
use crate::store::Backend;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend and configuration. Production uses [`PgBackend`]; tests plug in
/// the in-memory backend.
#[derive(Clone)]
pub struct AppState<B: Backend = PgBackend> {
    inner: Arc<AppStateInner<B>>,
}

struct AppStateInner<B: Backend> {
    config: StorefrontConfig,
    backend: B,
    checkout: Checkout<B>,
}

impl<B: Backend> AppState<B> {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, backend: B) -> Self {
        let checkout = Checkout::new(backend.clone(), config.currency);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Get a reference to the checkout orchestrator.
    #[must_use]
    pub fn checkout(&self) -> &Checkout<B> {
        &self.inner.checkout
    }
}
