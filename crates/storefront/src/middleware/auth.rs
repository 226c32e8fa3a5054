//! Authentication extractors.
//!
//! Shoppers are identified by the `CurrentCustomer` stored in their session.
//! The admin API is guarded by a static bearer token from configuration.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde_json::json;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};
use crate::state::AppState;
use crate::store::Backend;

/// Error returned when a request lacks the required credentials.
#[derive(Debug)]
pub struct AuthRejection(&'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": self.0 })),
        )
            .into_response()
    }
}

/// Extractor that requires a signed-in customer.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(customer): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", customer.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(customer) = OptionalAuth::from_request_parts(parts, state)
            .await
            .unwrap_or(OptionalAuth(None));

        customer
            .map(Self)
            .ok_or(AuthRejection("Please sign in to continue"))
    }
}

/// Extractor that optionally gets the current customer.
///
/// Unlike `RequireAuth`, this does not reject guests.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        if let Some(customer) = &customer {
            crate::error::set_sentry_user(&customer.id, Some(customer.email.as_str()));
        }

        Ok(Self(customer))
    }
}

/// Extractor that requires `Authorization: Bearer <admin token>`.
pub struct RequireAdmin;

impl<B: Backend> FromRequestParts<AppState<B>> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AuthRejection("Missing admin credentials"))?;

        if token_matches(presented, state.config().admin_token.expose_secret()) {
            Ok(Self)
        } else {
            tracing::warn!("Rejected admin request with invalid token");
            Err(AuthRejection("Invalid admin credentials"))
        }
    }
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

/// Helper to set the current customer in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("s3cr3t-token", "s3cr3t-token"));
        assert!(!token_matches("s3cr3t-tokem", "s3cr3t-token"));
        assert!(!token_matches("s3cr3t", "s3cr3t-token"));
        assert!(!token_matches("", "s3cr3t-token"));
    }
}
