//! Scripted in-process payment gateway for tests.
//!
//! Every call is recorded, and the outcome of the next confirmation can be
//! chosen up front.

use std::sync::{Arc, Mutex, PoisonError};

use secrecy::SecretString;

use larkspur_core::CurrencyCode;

use super::{
    Authorization, BillingDetails, Confirmation, ConfirmationStatus, PaymentError,
    PaymentGateway, PaymentMetadata,
};

/// What the scripted gateway does on `confirm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Succeed,
    /// Succeed, but report a different amount than was authorized.
    SucceedWithAmount(i64),
    RequireAction,
    Fail(String),
    Decline(String),
    /// Authorization itself is rejected.
    RejectAuthorization(String),
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Authorize { amount_minor: i64, currency: CurrencyCode },
    Confirm { authorization_id: String, payment_method: String },
}

#[derive(Clone)]
pub struct ScriptedGateway {
    inner: Arc<Mutex<ScriptedState>>,
}

struct ScriptedState {
    outcome: ScriptedOutcome,
    calls: Vec<GatewayCall>,
    next_id: u32,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new(ScriptedOutcome::Succeed)
    }
}

impl ScriptedGateway {
    #[must_use]
    pub fn new(outcome: ScriptedOutcome) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedState {
                outcome,
                calls: Vec::new(),
                next_id: 1,
            })),
        }
    }

    pub fn set_outcome(&self, outcome: ScriptedOutcome) {
        self.lock().outcome = outcome;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn create_authorization(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        _metadata: &PaymentMetadata,
    ) -> Result<Authorization, PaymentError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Authorize {
            amount_minor,
            currency,
        });
        if let ScriptedOutcome::RejectAuthorization(message) = &state.outcome {
            return Err(PaymentError::Declined {
                message: message.clone(),
                code: None,
            });
        }

        let id = format!("pi_test_{}", state.next_id);
        state.next_id += 1;
        Ok(Authorization {
            token: SecretString::from(format!("{id}_secret")),
            id,
            amount_minor,
            currency,
        })
    }

    async fn confirm(
        &self,
        authorization: &Authorization,
        _billing: &BillingDetails,
        payment_method: &str,
    ) -> Result<Confirmation, PaymentError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Confirm {
            authorization_id: authorization.id.clone(),
            payment_method: payment_method.to_owned(),
        });

        let (status, amount_minor, message) = match &state.outcome {
            ScriptedOutcome::Succeed | ScriptedOutcome::RejectAuthorization(_) => {
                (ConfirmationStatus::Succeeded, authorization.amount_minor, None)
            }
            ScriptedOutcome::SucceedWithAmount(amount) => {
                (ConfirmationStatus::Succeeded, *amount, None)
            }
            ScriptedOutcome::RequireAction => (
                ConfirmationStatus::RequiresAction,
                authorization.amount_minor,
                None,
            ),
            ScriptedOutcome::Fail(message) => (
                ConfirmationStatus::Failed,
                authorization.amount_minor,
                Some(message.clone()),
            ),
            ScriptedOutcome::Decline(message) => {
                return Err(PaymentError::Declined {
                    message: message.clone(),
                    code: Some("card_declined".to_owned()),
                });
            }
        };

        Ok(Confirmation {
            status,
            authorization_id: authorization.id.clone(),
            amount_minor,
            message,
        })
    }
}
