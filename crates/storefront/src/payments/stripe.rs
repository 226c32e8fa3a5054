//! Stripe payment intents client.
//!
//! Uses the form-encoded REST API directly with `reqwest`. One payment intent
//! is created per checkout attempt and confirmed server-side with the payment
//! method id produced by Stripe Elements in the browser.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use larkspur_core::CurrencyCode;

use super::{
    Authorization, BillingDetails, Confirmation, ConfirmationStatus, PaymentError,
    PaymentGateway, PaymentMetadata,
};
use crate::config::PaymentConfig;

/// Client for the Stripe payment intents API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

/// Subset of the payment intent object we read.
#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    status: String,
    #[serde(default)]
    last_payment_error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            inner: Arc::new(StripeClientInner {
                client: reqwest::Client::new(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    /// POST a form and decode a payment intent, mapping Stripe errors.
    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{}{path}", self.inner.api_base);
        let mut request = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(map_error_response(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

impl PaymentGateway for StripeClient {
    #[instrument(skip(self, metadata), fields(currency = %currency))]
    async fn create_authorization(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        metadata: &PaymentMetadata,
    ) -> Result<Authorization, PaymentError> {
        let mut form = vec![
            ("amount".to_owned(), amount_minor.to_string()),
            ("currency".to_owned(), currency.gateway_code().to_owned()),
            ("payment_method_types[]".to_owned(), "card".to_owned()),
        ];
        form.extend(
            metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );

        // Fresh key per attempt: a retried HTTP request must not create a
        // second intent, but a resubmitted checkout must.
        let idempotency_key = Uuid::new_v4().to_string();
        let intent = self
            .post_form("/v1/payment_intents", &form, Some(&idempotency_key))
            .await?;

        let token = intent
            .client_secret
            .ok_or_else(|| PaymentError::Parse("payment intent has no client_secret".to_owned()))?;

        debug!(authorization_id = %intent.id, amount_minor, "Payment intent created");

        Ok(Authorization {
            id: intent.id,
            token: SecretString::from(token),
            amount_minor: intent.amount,
            currency,
        })
    }

    #[instrument(skip(self, authorization, billing, payment_method), fields(authorization_id = %authorization.id))]
    async fn confirm(
        &self,
        authorization: &Authorization,
        billing: &BillingDetails,
        payment_method: &str,
    ) -> Result<Confirmation, PaymentError> {
        let form = vec![
            ("payment_method".to_owned(), payment_method.to_owned()),
            ("receipt_email".to_owned(), billing.email.clone()),
            ("shipping[name]".to_owned(), billing.name.clone()),
            ("shipping[phone]".to_owned(), billing.phone.clone()),
            ("shipping[address][line1]".to_owned(), billing.address.clone()),
        ];

        let path = format!("/v1/payment_intents/{}/confirm", authorization.id);
        let intent = self.post_form(&path, &form, None).await?;

        let status = map_intent_status(&intent.status);
        debug!(status = %intent.status, "Payment intent confirmed");

        Ok(Confirmation {
            status,
            authorization_id: intent.id,
            amount_minor: intent.amount,
            message: intent.last_payment_error.and_then(|e| e.message),
        })
    }
}

/// Collapse Stripe's intent states onto the three the checkout cares about.
fn map_intent_status(status: &str) -> ConfirmationStatus {
    match status {
        "succeeded" => ConfirmationStatus::Succeeded,
        "requires_action" | "requires_confirmation" | "processing" => {
            ConfirmationStatus::RequiresAction
        }
        _ => ConfirmationStatus::Failed,
    }
}

/// Card errors carry a customer-facing message; everything else is ours.
fn map_error_response(status: u16, body: &str) -> PaymentError {
    match serde_json::from_str::<StripeErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.kind.as_deref() == Some("card_error") => {
            PaymentError::Declined {
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "Your card was declined.".to_owned()),
                code: envelope.error.code,
            }
        }
        Ok(envelope) => PaymentError::Api {
            status,
            message: envelope.error.message.unwrap_or_default(),
        },
        Err(_) => PaymentError::Api {
            status,
            message: body.chars().take(200).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_intent_status() {
        assert_eq!(map_intent_status("succeeded"), ConfirmationStatus::Succeeded);
        assert_eq!(
            map_intent_status("requires_action"),
            ConfirmationStatus::RequiresAction
        );
        assert_eq!(
            map_intent_status("requires_payment_method"),
            ConfirmationStatus::Failed
        );
        assert_eq!(map_intent_status("canceled"), ConfirmationStatus::Failed);
    }

    #[test]
    fn test_card_error_is_declined_with_gateway_message() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        match map_error_response(402, body) {
            PaymentError::Declined { message, code } => {
                assert_eq!(message, "Your card was declined.");
                assert_eq!(code.as_deref(), Some("card_declined"));
            }
            other => panic!("expected Declined, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_request_is_api_error() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such payment_intent"}}"#;
        assert!(matches!(
            map_error_response(404, body),
            PaymentError::Api { status: 404, .. }
        ));
    }

    #[test]
    fn test_unparseable_error_body() {
        assert!(matches!(
            map_error_response(502, "<html>bad gateway</html>"),
            PaymentError::Api { status: 502, .. }
        ));
    }
}
