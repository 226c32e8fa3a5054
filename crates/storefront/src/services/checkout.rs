//! Checkout orchestrator.
//!
//! One attempt runs these phases strictly in order:
//!
//! ```text
//! Idle -> Validating -> AuthorizingPayment -> ConfirmingPayment
//!      -> WritingOrder -> DecrementingStock -> Notifying -> Done
//! ```
//!
//! Failing is only possible before `WritingOrder`; nothing durable or
//! financial has happened yet, so the shopper can simply retry. Once the
//! payment is confirmed the attempt is committed: stock and notification
//! problems become warnings and the shopper still gets a receipt. If the order
//! itself cannot be written, the charge is recorded for manual
//! reconciliation and the attempt ends in `Unreconciled`.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use larkspur_core::{
    Cart, CurrencyCode, CustomerDetails, CustomerId, Email, EmailError, MoneyError, OrderDraft,
    OrderId, OrderItem, OrderType, PaymentRecord, ProductId, to_minor_units,
};

use super::accounts::{self, AccountError};
use super::cart::{CartStore, CartStoreError};
use super::inventory::{self, Shortage};
use super::notifications::{self, NotificationWarning};
use super::orders;
use super::stock::{self, StockWarning};
use crate::models::CurrentCustomer;
use crate::payments::{
    Authorization, BillingDetails, ConfirmationStatus, PaymentError, PaymentGateway,
    PaymentMetadata,
};
use crate::store::{Backend, Catalog, ReconciliationLog, UnreconciledPayment};

// =============================================================================
// Phases
// =============================================================================

/// Where a checkout attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    Validating,
    AuthorizingPayment,
    ConfirmingPayment,
    WritingOrder,
    DecrementingStock,
    Notifying,
    Done,
    /// Recoverable failure before any charge.
    Failed,
    /// Charged, but the order could not be written.
    Unreconciled,
}

impl CheckoutPhase {
    /// The phase that follows on success, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Validating),
            Self::Validating => Some(Self::AuthorizingPayment),
            Self::AuthorizingPayment => Some(Self::ConfirmingPayment),
            Self::ConfirmingPayment => Some(Self::WritingOrder),
            Self::WritingOrder => Some(Self::DecrementingStock),
            Self::DecrementingStock => Some(Self::Notifying),
            Self::Notifying => Some(Self::Done),
            Self::Done | Self::Failed | Self::Unreconciled => None,
        }
    }

    /// Whether `Failed` may be entered from here.
    #[must_use]
    pub const fn can_fail(self) -> bool {
        matches!(
            self,
            Self::Validating | Self::AuthorizingPayment | Self::ConfirmingPayment
        )
    }

    /// Whether the payment has been taken and the attempt can no longer fail.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(
            self,
            Self::WritingOrder | Self::DecrementingStock | Self::Notifying | Self::Done
        )
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Failed => self.can_fail(),
            Self::Unreconciled => matches!(self, Self::WritingOrder),
            _ => match self.next() {
                Some(n) => n as u8 == next as u8,
                None => false,
            },
        }
    }
}

/// Phase trail of one attempt.
#[derive(Debug)]
struct Attempt {
    phase: CheckoutPhase,
    trail: Vec<CheckoutPhase>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            phase: CheckoutPhase::Idle,
            trail: vec![CheckoutPhase::Idle],
        }
    }

    fn enter(&mut self, next: CheckoutPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal checkout transition {:?} -> {next:?}",
            self.phase
        );
        debug!(from = ?self.phase, to = ?next, "Checkout phase");
        self.phase = next;
        self.trail.push(next);
    }

    /// Enter `Failed` and hand back the error.
    fn fail(&mut self, error: CheckoutError) -> CheckoutError {
        self.enter(CheckoutPhase::Failed);
        info!(error = %error, "Checkout failed before payment was taken");
        error
    }
}

// =============================================================================
// Double-submit guard
// =============================================================================

/// Carts with a checkout currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<Mutex<HashSet<String>>>);

impl InFlight {
    /// Claim `key`, or `None` if an attempt for it is already running.
    #[must_use]
    pub fn try_acquire(&self, key: String) -> Option<InFlightGuard> {
        let inserted = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| InFlightGuard {
            set: Arc::clone(&self.0),
            key,
        })
    }

    #[must_use]
    pub fn is_running(&self, key: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Releases the claimed key when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

// =============================================================================
// Request / outcome
// =============================================================================

/// Shopper-supplied checkout form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Gateway handle for the card collected client-side.
    pub payment_method: String,
    /// Set to create an account with this password before paying.
    #[serde(default)]
    pub create_account_password: Option<String>,
}

/// Why a checkout was refused before any network call.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("order total must be greater than zero")]
    NonPositiveTotal,

    #[error("please select a size for: {}", .0.join(", "))]
    MissingSize(Vec<String>),

    #[error("{0} is no longer available")]
    UnknownProduct(ProductId),

    #[error("not enough stock: {}", join_shortages(.0))]
    OutOfStock(Vec<Shortage>),

    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),
}

fn join_shortages(short: &[Shortage]) -> String {
    short
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything that can end a checkout attempt without a receipt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("payment failed: {0}")]
    Gateway(#[from] PaymentError),

    #[error("payment was not completed: {message}")]
    PaymentNotCompleted {
        status: ConfirmationStatus,
        message: String,
    },

    #[error("a checkout for this cart is already in progress")]
    AlreadyInProgress,

    #[error("cart unavailable: {0}")]
    Cart(#[from] CartStoreError),

    #[error("catalog unavailable: {0}")]
    Catalog(crate::db::RepositoryError),

    /// Charged with no order written. Must not be retried blindly.
    #[error("payment {authorization_id} was taken but the order was not recorded: {reason}")]
    Unreconciled {
        authorization_id: String,
        reason: String,
    },
}

impl CheckoutError {
    /// Text safe to show the shopper.
    #[must_use]
    pub fn customer_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Account(AccountError::AlreadyExists) => {
                "An account with this email already exists. Sign in, or check out as a guest."
                    .to_owned()
            }
            Self::Account(AccountError::WeakPassword(msg)) => msg.clone(),
            Self::Account(_) => "We could not create your account. Please try again.".to_owned(),
            Self::Gateway(e) => e.customer_message(),
            Self::PaymentNotCompleted { message, .. } => message.clone(),
            Self::AlreadyInProgress => {
                "Your order is already being processed. Please wait.".to_owned()
            }
            Self::Cart(_) | Self::Catalog(_) => {
                "We could not load your cart. Please try again.".to_owned()
            }
            Self::Unreconciled {
                authorization_id, ..
            } => format!(
                "Your payment was received but we could not record your order. \
                 Please do not pay again; contact support with reference {authorization_id}."
            ),
        }
    }
}

/// Problems after the order was written. Logged, never shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CheckoutWarning {
    Stock(String),
    Notification(String),
    Cart(String),
}

impl From<StockWarning> for CheckoutWarning {
    fn from(w: StockWarning) -> Self {
        Self::Stock(w.to_string())
    }
}

impl From<NotificationWarning> for CheckoutWarning {
    fn from(w: NotificationWarning) -> Self {
        Self::Notification(w.0)
    }
}

/// What the shopper is shown after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub order_id: OrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub total: Decimal,
    /// Set when an account was created during this checkout.
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug)]
pub struct CheckoutOutcome {
    pub receipt: Receipt,
    pub warnings: Vec<CheckoutWarning>,
    pub phases: Vec<CheckoutPhase>,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs checkout attempts against one backend.
#[derive(Clone)]
pub struct Checkout<B: Backend> {
    backend: B,
    currency: CurrencyCode,
    in_flight: InFlight,
}

/// Validated inputs carried from `Validating` to `WritingOrder`.
struct Validated {
    customer: CustomerDetails,
    items: Vec<OrderItem>,
    total: Decimal,
    amount_minor: i64,
}

impl<B: Backend> Checkout<B> {
    #[must_use]
    pub fn new(backend: B, currency: CurrencyCode) -> Self {
        Self {
            backend,
            currency,
            in_flight: InFlight::default(),
        }
    }

    #[must_use]
    pub const fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Run one checkout attempt for the cart in `cart_store`.
    ///
    /// # Errors
    ///
    /// Any error other than `CheckoutError::Unreconciled` means no charge was
    /// taken and nothing durable changed.
    #[instrument(skip_all, fields(signed_in = customer.is_some()))]
    pub async fn run<S: CartStore>(
        &self,
        cart_store: &S,
        customer: Option<&CurrentCustomer>,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let owner = cart_store.owner_key().await?;
        let _guard = self
            .in_flight
            .try_acquire(owner)
            .ok_or(CheckoutError::AlreadyInProgress)?;

        let mut attempt = Attempt::new();

        // Validating
        attempt.enter(CheckoutPhase::Validating);
        let cart = match cart_store.load().await {
            Ok(cart) => cart,
            Err(e) => return Err(attempt.fail(e.into())),
        };
        let validated = match self.validate(&cart, &request).await {
            Ok(v) => v,
            Err(e) => return Err(attempt.fail(e)),
        };
        let (customer_id, account_created) = match self
            .resolve_customer(customer, &validated.customer, &request)
            .await
        {
            Ok(ids) => ids,
            Err(e) => return Err(attempt.fail(e)),
        };
        let order_type = if customer_id.is_some() {
            OrderType::Registered
        } else {
            OrderType::Guest
        };

        // AuthorizingPayment
        attempt.enter(CheckoutPhase::AuthorizingPayment);
        let metadata = payment_metadata(&validated, order_type);
        let authorization = match self
            .backend
            .gateway()
            .create_authorization(validated.amount_minor, self.currency, &metadata)
            .await
        {
            Ok(a) => a,
            Err(e) => return Err(attempt.fail(e.into())),
        };

        // ConfirmingPayment
        attempt.enter(CheckoutPhase::ConfirmingPayment);
        let billing = BillingDetails {
            name: validated.customer.name.clone(),
            email: validated.customer.email.to_string(),
            phone: validated.customer.phone.clone(),
            address: validated.customer.address.clone(),
        };
        let confirmation = match self
            .backend
            .gateway()
            .confirm(&authorization, &billing, request.payment_method.trim())
            .await
        {
            Ok(c) => c,
            Err(e) => return Err(attempt.fail(e.into())),
        };
        match confirmation.status {
            ConfirmationStatus::Succeeded => {}
            ConfirmationStatus::RequiresAction => {
                return Err(attempt.fail(CheckoutError::PaymentNotCompleted {
                    status: confirmation.status,
                    message: "Your bank requires additional verification. Please try again \
                              or use a different card."
                        .to_owned(),
                }));
            }
            ConfirmationStatus::Failed => {
                return Err(attempt.fail(CheckoutError::PaymentNotCompleted {
                    status: confirmation.status,
                    message: confirmation
                        .message
                        .unwrap_or_else(|| "Your payment could not be completed.".to_owned()),
                }));
            }
        }

        // WritingOrder: the shopper has been charged from here on.
        attempt.enter(CheckoutPhase::WritingOrder);
        info!(authorization_id = %authorization.id, "Payment confirmed");

        if confirmation.authorization_id != authorization.id
            || confirmation.amount_minor != validated.amount_minor
        {
            let reason = format!(
                "confirmation mismatch: authorized {} ({} minor units), confirmed {} ({} minor units)",
                authorization.id,
                validated.amount_minor,
                confirmation.authorization_id,
                confirmation.amount_minor
            );
            attempt.enter(CheckoutPhase::Unreconciled);
            return Err(self
                .unreconciled(&authorization, confirmation.amount_minor, &validated, reason)
                .await);
        }

        let draft = OrderDraft {
            customer: validated.customer.clone(),
            customer_id,
            items: validated.items.clone(),
            payment: PaymentRecord {
                method: "card".to_owned(),
                reference: authorization.id.clone(),
                amount: self.currency.from_minor_units(confirmation.amount_minor),
            },
        };
        let order = match orders::create_order(self.backend.orders(), draft).await {
            Ok(order) => order,
            Err(e) => {
                attempt.enter(CheckoutPhase::Unreconciled);
                return Err(self
                    .unreconciled(
                        &authorization,
                        confirmation.amount_minor,
                        &validated,
                        format!("order write failed: {e}"),
                    )
                    .await);
            }
        };
        info!(order_number = %order.order_number, total = %order.total, "Order written");

        let mut warnings: Vec<CheckoutWarning> = Vec::new();

        // DecrementingStock
        attempt.enter(CheckoutPhase::DecrementingStock);
        warnings.extend(
            stock::decrement(self.backend.inventory(), &order.order_number, &order.items)
                .await
                .into_iter()
                .map(CheckoutWarning::from),
        );

        // Notifying
        attempt.enter(CheckoutPhase::Notifying);
        let dispatched = notifications::notify_new_order(
            self.backend.notifications(),
            self.backend.mailer(),
            &order,
        )
        .await;
        warnings.extend(dispatched.warnings.into_iter().map(CheckoutWarning::from));

        if let Err(e) = cart_store.clear().await {
            warn!(error = %e, "Cart not cleared after checkout");
            warnings.push(CheckoutWarning::Cart(e.to_string()));
        }

        attempt.enter(CheckoutPhase::Done);
        if !warnings.is_empty() {
            warn!(order_number = %order.order_number, count = warnings.len(), "Checkout completed with warnings");
        }

        Ok(CheckoutOutcome {
            receipt: Receipt {
                order_id: order.id,
                order_number: order.order_number,
                order_type: order.order_type,
                total: order.total,
                customer_id: account_created,
            },
            warnings,
            phases: attempt.trail,
        })
    }

    /// Check the form and cart without any network side effects.
    async fn validate(
        &self,
        cart: &Cart,
        request: &CheckoutRequest,
    ) -> Result<Validated, CheckoutError> {
        let name = required(&request.name, "name")?;
        let email_raw = required(&request.email, "email")?;
        let phone = required(&request.phone, "phone")?;
        let address = required(&request.address, "address")?;
        required(&request.payment_method, "payment method")?;
        let email = Email::parse(email_raw).map_err(ValidationError::from)?;

        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let mut unsized_lines = Vec::new();
        for line in cart.lines() {
            let product = self
                .backend
                .catalog()
                .product(&line.product_id)
                .await
                .map_err(CheckoutError::Catalog)?
                .ok_or_else(|| ValidationError::UnknownProduct(line.product_id.clone()))?;
            if (line.requires_size || product.requires_size()) && line.selected_size.is_none() {
                unsized_lines.push(line.name.clone());
            }
        }
        if !unsized_lines.is_empty() {
            return Err(ValidationError::MissingSize(unsized_lines).into());
        }

        let total = cart.total();
        if total <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveTotal.into());
        }
        let amount_minor = to_minor_units(total, self.currency).map_err(ValidationError::from)?;

        let short = inventory::shortages(self.backend.inventory(), cart).await;
        if !short.is_empty() {
            return Err(ValidationError::OutOfStock(short).into());
        }

        Ok(Validated {
            customer: CustomerDetails {
                name: name.to_owned(),
                email,
                phone: phone.to_owned(),
                address: address.to_owned(),
            },
            items: cart.lines().iter().map(OrderItem::from).collect(),
            total,
            amount_minor,
        })
    }

    /// Signed-in customer id, or a freshly created account's id.
    ///
    /// Returns `(customer_id, newly_created_id)`.
    async fn resolve_customer(
        &self,
        signed_in: Option<&CurrentCustomer>,
        details: &CustomerDetails,
        request: &CheckoutRequest,
    ) -> Result<(Option<CustomerId>, Option<CustomerId>), CheckoutError> {
        if let Some(current) = signed_in {
            return Ok((Some(current.id), None));
        }
        match request.create_account_password.as_deref() {
            Some(password) => {
                let id = accounts::create_account(
                    self.backend.customers(),
                    &details.email,
                    &details.name,
                    password,
                )
                .await?;
                Ok((Some(id), Some(id)))
            }
            None => Ok((None, None)),
        }
    }

    /// Record a charge with no order and build the error for the shopper.
    async fn unreconciled(
        &self,
        authorization: &Authorization,
        charged_minor: i64,
        validated: &Validated,
        reason: String,
    ) -> CheckoutError {
        error!(
            authorization_id = %authorization.id,
            amount_minor = charged_minor,
            total = %validated.total,
            %reason,
            "Payment taken but order not recorded"
        );

        sentry::with_scope(
            |scope| {
                scope.set_tag("authorization_id", &authorization.id);
                scope.set_extra("amount_minor", charged_minor.into());
            },
            || {
                sentry::capture_message(
                    &format!("Unreconciled payment {}: {reason}", authorization.id),
                    sentry::Level::Fatal,
                )
            },
        );

        let entry = UnreconciledPayment {
            authorization_id: authorization.id.clone(),
            amount_minor: charged_minor,
            currency: self.currency.to_string(),
            customer_email: validated.customer.email.to_string(),
            reason: reason.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.backend.reconciliation().record(&entry).await {
            error!(authorization_id = %authorization.id, error = %e, "Reconciliation entry not recorded");
        }

        CheckoutError::Unreconciled {
            authorization_id: authorization.id.clone(),
            reason,
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

fn payment_metadata(validated: &Validated, order_type: OrderType) -> PaymentMetadata {
    let item_count: u32 = validated.items.iter().map(|i| i.quantity).sum();
    BTreeMap::from([
        (
            "customer_email".to_owned(),
            validated.customer.email.to_string(),
        ),
        ("item_count".to_owned(), item_count.to_string()),
        ("order_type".to_owned(), order_type.to_string()),
    ])
}
