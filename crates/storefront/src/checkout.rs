//! Checkout wizard.
//!
//! `ReviewCart -> Shipping -> Payment -> Confirmed`. The orchestrator owns
//! the step and the [`CheckoutDraft`]; the cart stays the source of truth for
//! what is being bought and [`Totals`] are re-derived from it on every call.
//!
//! The `Shipping -> Payment` transition is the authentication gate: without a
//! credential the draft is persisted and the caller is told to send the
//! shopper to sign in, after which [`CheckoutOrchestrator::enter`] restores it.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use souq_core::{AmountOverflow, CheckoutDraft, CheckoutStep, OrderId, OrderResult, Price, Totals};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::endpoints::OrderEndpoint;
use crate::api::{ApiRequest, classify_mutation, send_bounded};
use crate::collection::{CacheDeps, CartCache};
use crate::error::{ClientError, add_breadcrumb, capture_unexpected};
use crate::gate::MutationGate;
use crate::notify::Notification;
use crate::storage::{PersistedDraftStore, StorageError};

/// Route the shopper returns to after the forced sign-in.
pub const CHECKOUT_ROUTE: &str = "/checkout";

/// Checkout errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart was empty on entry; leave the workflow.
    #[error("Cart is empty")]
    EmptyCart,

    /// `submit` called outside the payment step.
    #[error("Order can only be placed from the payment step (currently at {0})")]
    NotAtPayment(CheckoutStep),

    /// Required shipping fields are blank.
    #[error("Missing shipping details: {}", .0.join(", "))]
    IncompleteDraft(Vec<&'static str>),

    /// Order placement failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Why `next` did not move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The cart is empty.
    EmptyCart,
    /// Labels of the blank shipping fields, in form order.
    MissingFields(Vec<&'static str>),
    /// Payment advances only through [`CheckoutOrchestrator::submit`].
    SubmitRequired,
    /// The workflow is complete.
    Finished,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCart => f.write_str("the cart is empty"),
            Self::MissingFields(fields) => write!(f, "missing {}", fields.join(", ")),
            Self::SubmitRequired => f.write_str("the order must be submitted"),
            Self::Finished => f.write_str("the order is already placed"),
        }
    }
}

/// Outcome of a forward transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved(CheckoutStep),
    Blocked {
        step: CheckoutStep,
        reason: BlockReason,
    },
    /// The draft was persisted; send the shopper to sign in and back to
    /// `return_to` afterwards.
    LoginRequired { return_to: &'static str },
}

/// Place-order response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacedOrder {
    #[serde(alias = "order_id")]
    order_id: OrderId,
    #[serde(alias = "total_price")]
    total_price: Price,
}

fn missing_labels(draft: &CheckoutDraft) -> Vec<&'static str> {
    draft
        .missing_fields()
        .into_iter()
        .map(|field| field.label())
        .collect()
}

#[derive(Debug, Default)]
struct Progress {
    step: CheckoutStep,
    draft: CheckoutDraft,
    order: Option<OrderResult>,
}

/// One checkout attempt.
pub struct CheckoutOrchestrator {
    cart: Arc<CartCache>,
    drafts: PersistedDraftStore,
    deps: CacheDeps,
    endpoint: OrderEndpoint,
    shipping_fee: Price,
    progress: Mutex<Progress>,
    submitting: MutationGate,
}

impl std::fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("step", &self.step())
            .field("submitting", &self.submitting.is_held())
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Enter the workflow.
    ///
    /// Resumes at `Shipping` with the persisted draft when one exists,
    /// otherwise starts at `ReviewCart` with an empty draft. Refresh the cart
    /// first; entry is judged on its current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` when the cart is empty.
    pub fn enter(
        cart: Arc<CartCache>,
        drafts: PersistedDraftStore,
        deps: CacheDeps,
        shipping_fee: Price,
    ) -> Result<Self, CheckoutError> {
        if cart.snapshot().is_empty() {
            info!("Checkout entered with an empty cart");
            return Err(CheckoutError::EmptyCart);
        }

        let progress = drafts.load().map_or_else(Progress::default, |draft| {
            info!("Resuming checkout with saved shipping details");
            Progress {
                step: CheckoutStep::Shipping,
                draft,
                order: None,
            }
        });

        Ok(Self {
            cart,
            drafts,
            deps,
            endpoint: OrderEndpoint::new(),
            shipping_fee,
            progress: Mutex::new(progress),
            submitting: MutationGate::new(),
        })
    }

    /// The current step.
    #[must_use]
    pub fn step(&self) -> CheckoutStep {
        self.lock().step
    }

    /// The shipping draft.
    #[must_use]
    pub fn draft(&self) -> CheckoutDraft {
        self.lock().draft.clone()
    }

    /// The placed order, once `Confirmed`.
    #[must_use]
    pub fn order(&self) -> Option<OrderResult> {
        self.lock().order.clone()
    }

    pub fn set_full_name(&self, value: impl Into<String>) {
        self.lock().draft.full_name = value.into();
    }

    pub fn set_address(&self, value: impl Into<String>) {
        self.lock().draft.address = value.into();
    }

    pub fn set_city(&self, value: impl Into<String>) {
        self.lock().draft.city = value.into();
    }

    /// Replace the whole draft.
    pub fn set_draft(&self, draft: CheckoutDraft) {
        self.lock().draft = draft;
    }

    /// Totals from the live cart snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` when the figures leave the decimal range.
    pub fn totals(&self) -> Result<Totals, AmountOverflow> {
        Totals::for_cart(&self.cart.snapshot().items, self.shipping_fee)
    }

    /// Attempt the next forward transition.
    ///
    /// `Payment -> Confirmed` is not reachable here; use [`submit`](Self::submit).
    #[instrument(skip(self), fields(step = %self.step()))]
    pub fn next(&self) -> Transition {
        let mut progress = self.lock();

        match progress.step {
            CheckoutStep::ReviewCart => {
                if self.cart.snapshot().is_empty() {
                    return Transition::Blocked {
                        step: progress.step,
                        reason: BlockReason::EmptyCart,
                    };
                }
                progress.step = CheckoutStep::Shipping;
                Transition::Moved(progress.step)
            }
            CheckoutStep::Shipping => {
                let missing = missing_labels(&progress.draft);
                if !missing.is_empty() {
                    self.report_missing(&missing);
                    return Transition::Blocked {
                        step: progress.step,
                        reason: BlockReason::MissingFields(missing),
                    };
                }

                if !self.deps.session.is_authenticated() {
                    if let Err(e) = self.drafts.save(&progress.draft) {
                        let err = ClientError::from(e);
                        capture_unexpected(&err);
                        self.deps
                            .notifier
                            .report(Notification::error(err.user_message()));
                    }
                    info!("Sign-in required before payment, shipping details saved");
                    return Transition::LoginRequired {
                        return_to: CHECKOUT_ROUTE,
                    };
                }

                progress.step = CheckoutStep::Payment;
                Transition::Moved(progress.step)
            }
            CheckoutStep::Payment => Transition::Blocked {
                step: progress.step,
                reason: BlockReason::SubmitRequired,
            },
            CheckoutStep::Confirmed => Transition::Blocked {
                step: progress.step,
                reason: BlockReason::Finished,
            },
        }
    }

    /// Step back without side effects. The draft is kept.
    pub fn back(&self) -> CheckoutStep {
        let mut progress = self.lock();
        progress.step = match progress.step {
            CheckoutStep::Shipping => CheckoutStep::ReviewCart,
            CheckoutStep::Payment => CheckoutStep::Shipping,
            other => other,
        };
        progress.step
    }

    /// Place the order.
    ///
    /// On acknowledgment the workflow moves to `Confirmed`, the persisted
    /// draft is discarded and the cart is cleared. Any failure leaves the
    /// workflow at `Payment` so the shopper can retry.
    ///
    /// # Errors
    ///
    /// Returns `NotAtPayment` outside the payment step, `IncompleteDraft`
    /// for blank fields, or the classified placement failure. `Busy` (a
    /// submission already in flight) and `NotAtPayment` are not reported.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<OrderResult, CheckoutError> {
        let Some(_guard) = self.submitting.try_acquire() else {
            debug!("Order submission already in flight, ignoring");
            return Err(ClientError::Busy.into());
        };

        let draft = {
            let progress = self.lock();
            if progress.step != CheckoutStep::Payment {
                debug!(step = %progress.step, "Submit outside the payment step");
                return Err(CheckoutError::NotAtPayment(progress.step));
            }
            progress.draft.clone()
        };

        let missing = missing_labels(&draft);
        if !missing.is_empty() {
            self.report_missing(&missing);
            return Err(CheckoutError::IncompleteDraft(missing));
        }

        add_breadcrumb("checkout", "submit", None);

        let order = match self.place_order(&draft).await {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    error = %e,
                    kind = ?e.kind(),
                    transient = e.kind().is_transient(),
                    "Order placement failed"
                );
                capture_unexpected(&e);
                self.deps
                    .notifier
                    .report(Notification::error(e.user_message()));
                return Err(e.into());
            }
        };

        {
            let mut progress = self.lock();
            progress.step = CheckoutStep::Confirmed;
            progress.order = Some(order.clone());
        }

        info!(
            order_id = %order.order_id,
            total_price = %order.total_price,
            "Order placed"
        );

        if let Err(e) = self.drafts.discard() {
            warn!(error = %e, "Failed to discard checkout draft");
        }
        if let Err(e) = self.cart.clear_after_order().await {
            warn!(error = %e, "Order placed but the cart could not be cleared");
        }

        self.deps
            .notifier
            .report(Notification::success(order.message.clone()));
        Ok(order)
    }

    /// Leave the workflow and forget the persisted draft.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be deleted.
    pub fn abandon(&self) -> Result<(), StorageError> {
        self.drafts.discard()?;
        debug!("Checkout abandoned");
        Ok(())
    }

    async fn place_order(&self, draft: &CheckoutDraft) -> Result<OrderResult, ClientError> {
        let credential = self
            .deps
            .session
            .current_credential()
            .ok_or(ClientError::AuthenticationMissing)?;

        let route = &self.endpoint.place;
        let request = ApiRequest::new(route.method.clone(), route.path())
            .with_body(json!({
                "fullName": draft.full_name.trim(),
                "address": draft.address.trim(),
                "city": draft.city.trim(),
            }))
            .with_credential(credential);

        let response =
            send_bounded(self.deps.transport.as_ref(), self.deps.timeout, request).await?;
        let message = classify_mutation(&response, self.endpoint.placed_ack)?;

        let body = response.body.unwrap_or_default();
        let placed: PlacedOrder =
            serde_json::from_value(body).map_err(|e| ClientError::Malformed(e.to_string()))?;
        if placed.order_id.as_str().trim().is_empty() {
            return Err(ClientError::Malformed("order id is empty".to_string()));
        }

        Ok(OrderResult {
            order_id: placed.order_id,
            total_price: placed.total_price,
            message,
            placed_at: Utc::now(),
        })
    }

    fn report_missing(&self, labels: &[&str]) {
        self.deps.notifier.report(Notification::error(format!(
            "Please fill in your {}",
            labels.join(", ")
        )));
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        match self.progress.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
