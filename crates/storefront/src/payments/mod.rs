//! Payment gateway client.
//!
//! # Flow
//!
//! 1. [`PaymentGateway::create_authorization`] asks the gateway to hold a fixed
//!    amount and returns an opaque token plus the authorization id.
//! 2. [`PaymentGateway::confirm`] confirms the cardholder's payment method
//!    (an opaque handle produced by the gateway's own card widget) against
//!    that authorization.
//!
//! Amounts always cross this boundary as integer minor units. Card data never
//! does. Authorizations are single-use: every checkout attempt creates a fresh
//! one, and nothing here retries.

mod stripe;

#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use stripe::StripeClient;

use std::collections::BTreeMap;
use std::future::Future;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use larkspur_core::CurrencyCode;

/// Errors talking to the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request (card declined, invalid handle, ...).
    ///
    /// `message` is the gateway's own customer-facing text.
    #[error("payment declined: {message}")]
    Declined {
        message: String,
        code: Option<String>,
    },

    /// The gateway returned an error that is not the customer's to fix.
    #[error("gateway error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl PaymentError {
    /// Message safe to show the customer.
    #[must_use]
    pub fn customer_message(&self) -> String {
        match self {
            Self::Declined { message, .. } => message.clone(),
            Self::Http(_) | Self::Api { .. } | Self::Parse(_) => {
                "The payment could not be processed. Please try again.".to_owned()
            }
        }
    }
}

/// A gateway-held authorization for a fixed amount.
#[derive(Debug, Clone)]
pub struct Authorization {
    /// Gateway identifier for the authorization (payment intent id).
    pub id: String,
    /// Opaque secret handed to the card widget. Never logged.
    pub token: SecretString,
    pub amount_minor: i64,
    pub currency: CurrencyCode,
}

/// Cardholder details sent with the confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Gateway-reported state of a confirmed authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Succeeded,
    /// The cardholder must complete an extra step (e.g. 3-D Secure).
    RequiresAction,
    Failed,
}

/// Result of confirming a payment method against an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub status: ConfirmationStatus,
    pub authorization_id: String,
    /// Amount the gateway reports as captured/authorized.
    pub amount_minor: i64,
    /// Gateway explanation when the status is not `Succeeded`.
    pub message: Option<String>,
}

/// Free-form key/value pairs attached to an authorization.
pub type PaymentMetadata = BTreeMap<String, String>;

/// An external card payment gateway.
pub trait PaymentGateway: Clone + Send + Sync + 'static {
    /// Request an authorization for `amount_minor` units of `currency`.
    fn create_authorization(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        metadata: &PaymentMetadata,
    ) -> impl Future<Output = Result<Authorization, PaymentError>> + Send;

    /// Confirm `payment_method` (a gateway-issued handle) against `authorization`.
    fn confirm(
        &self,
        authorization: &Authorization,
        billing: &BillingDetails,
        payment_method: &str,
    ) -> impl Future<Output = Result<Confirmation, PaymentError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_message_is_passed_through() {
        let err = PaymentError::Declined {
            message: "Your card has insufficient funds.".to_owned(),
            code: Some("card_declined".to_owned()),
        };
        assert_eq!(err.customer_message(), "Your card has insufficient funds.");
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let err = PaymentError::Api {
            status: 500,
            message: "upstream exploded".to_owned(),
        };
        assert!(!err.customer_message().contains("exploded"));
        assert!(!err.customer_message().is_empty());
    }
}
