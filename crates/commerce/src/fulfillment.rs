//! Order fulfillment pipeline.
//!
//! Converts a completed checkout session into an order. The pipeline is safe
//! to run on every delivery of the same webhook: the store claims the event
//! id inside the fulfillment transaction, so retries and concurrent
//! deliveries observe [`FulfillmentOutcome::Duplicate`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{CartId, OrderId};
use domain::{Order, OrderItem, OrderNumber, StockAdjustment};
use store::{FulfillmentCommit, FulfillmentRequest, Store};

use crate::error::{CommerceError, Result};
use crate::services::notification::{EmailMessage, Notifier};
use crate::state::FulfillmentState;
use crate::webhook::{WebhookEvent, WebhookVerifier};

/// What the pipeline did with a delivery. Every variant is acknowledged to the
/// provider.
#[derive(Debug, Clone)]
pub enum FulfillmentOutcome {
    /// The event type does not trigger fulfillment.
    Ignored { event_type: String },
    /// The session named a cart that does not exist.
    CartMissing { cart_id: CartId },
    /// The event was already processed.
    Duplicate { order_id: Option<OrderId> },
    /// The cart had no items; nothing was created.
    EmptyCart { cart_id: CartId },
    /// A new order was committed.
    Fulfilled(Box<FulfillmentReceipt>),
}

impl FulfillmentOutcome {
    /// The order created or found for this delivery, if any.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            FulfillmentOutcome::Fulfilled(receipt) => Some(receipt.order.id),
            FulfillmentOutcome::Duplicate { order_id } => *order_id,
            _ => None,
        }
    }

    /// Short label for logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentOutcome::Ignored { .. } => "ignored",
            FulfillmentOutcome::CartMissing { .. } => "cart_missing",
            FulfillmentOutcome::Duplicate { .. } => "duplicate",
            FulfillmentOutcome::EmptyCart { .. } => "empty_cart",
            FulfillmentOutcome::Fulfilled(_) => "fulfilled",
        }
    }
}

/// Details of a committed fulfillment.
#[derive(Debug, Clone)]
pub struct FulfillmentReceipt {
    pub event_id: String,
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Products that sold more units than were in stock.
    pub oversold: Vec<StockAdjustment>,
    pub cart_cleared: bool,
    pub notification_sent: bool,
    /// States visited, in order.
    pub trace: Vec<FulfillmentState>,
}

struct Progress {
    state: FulfillmentState,
    trace: Vec<FulfillmentState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: FulfillmentState::ReceivedEvent,
            trace: vec![FulfillmentState::ReceivedEvent],
        }
    }

    fn advance(&mut self, next: FulfillmentState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal fulfillment transition {} -> {next}",
            self.state
        );
        tracing::debug!(from = %self.state, to = %next, "fulfillment state");
        self.state = next;
        self.trace.push(next);
    }
}

/// Drives webhook deliveries through verification, the fulfillment
/// transaction and the post-commit side effects.
pub struct FulfillmentPipeline<S: Store> {
    store: S,
    verifier: WebhookVerifier,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> FulfillmentPipeline<S> {
    pub fn new(store: S, verifier: WebhookVerifier, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            verifier,
            notifier,
        }
    }

    /// Handles one raw webhook delivery.
    ///
    /// Returns `SignatureInvalid` or `MalformedEvent` when the request must be
    /// rejected, and `PartialFailure` when the provider should retry.
    #[tracing::instrument(skip_all)]
    pub async fn handle(&self, payload: &[u8], signature_header: &str) -> Result<FulfillmentOutcome> {
        metrics::counter!("fulfillment_events_total").increment(1);
        let start = Instant::now();
        let mut progress = Progress::new();

        let event = match self.verifier.construct_event(payload, signature_header) {
            Ok(event) => event,
            Err(e) => {
                if matches!(e, CommerceError::SignatureInvalid(_)) {
                    progress.advance(FulfillmentState::SignatureInvalid);
                }
                metrics::counter!("fulfillment_rejected").increment(1);
                tracing::warn!(error = %e, "webhook rejected");
                return Err(e);
            }
        };
        progress.advance(FulfillmentState::SignatureVerified);

        let result = self.run(event, progress).await;
        metrics::histogram!("fulfillment_duration_seconds").record(start.elapsed().as_secs_f64());
        result
    }

    /// Processes an event whose signature was already verified.
    pub async fn process(&self, event: WebhookEvent) -> Result<FulfillmentOutcome> {
        let mut progress = Progress::new();
        progress.advance(FulfillmentState::SignatureVerified);
        self.run(event, progress).await
    }

    #[tracing::instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    async fn run(&self, event: WebhookEvent, mut progress: Progress) -> Result<FulfillmentOutcome> {
        if !event.is_checkout_completed() {
            tracing::debug!("event type ignored");
            progress.advance(FulfillmentState::Done);
            return Ok(FulfillmentOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let cart_id = event.checkout_session()?.cart_id()?;

        if let Some(order_id) = self.store.processed_event(&event.id).await? {
            metrics::counter!("fulfillment_duplicates").increment(1);
            tracing::info!(%order_id, "event already processed");
            progress.advance(FulfillmentState::Done);
            return Ok(FulfillmentOutcome::Duplicate {
                order_id: Some(order_id),
            });
        }

        let Some(cart) = self.store.get_cart(cart_id).await? else {
            progress.advance(FulfillmentState::CartMissing);
            tracing::warn!(%cart_id, "checkout completed for unknown cart");
            return Ok(FulfillmentOutcome::CartMissing { cart_id });
        };
        progress.advance(FulfillmentState::CartResolved);

        let request = FulfillmentRequest {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            cart_id: cart.id,
            order_number: OrderNumber::generate(),
            now: Utc::now(),
        };

        let plan = match self.store.commit_fulfillment(request).await {
            Ok(FulfillmentCommit::Committed(plan)) => plan,
            Ok(FulfillmentCommit::AlreadyProcessed { order_id }) => {
                metrics::counter!("fulfillment_duplicates").increment(1);
                tracing::info!(order_id = ?order_id, "event processed concurrently");
                progress.advance(FulfillmentState::Done);
                return Ok(FulfillmentOutcome::Duplicate { order_id });
            }
            Ok(FulfillmentCommit::EmptyCart) => {
                tracing::info!(cart_id = %cart.id, "cart is empty, nothing to fulfill");
                progress.advance(FulfillmentState::Done);
                return Ok(FulfillmentOutcome::EmptyCart { cart_id: cart.id });
            }
            Err(e) => {
                progress.advance(FulfillmentState::PartialFailure);
                metrics::counter!("fulfillment_failed").increment(1);
                tracing::error!(error = %e, "fulfillment transaction aborted");
                return Err(CommerceError::PartialFailure {
                    event_id: event.id,
                    reason: e.to_string(),
                });
            }
        };
        progress.advance(FulfillmentState::OrderCreated);
        progress.advance(FulfillmentState::InventoryApplied);

        let plan = *plan;
        let oversold: Vec<StockAdjustment> = plan.oversold().cloned().collect();
        for adjustment in &oversold {
            metrics::counter!("inventory_oversold_units").increment(u64::from(adjustment.shortfall()));
        }
        let order = plan.order;

        // Post-commit steps are best effort.
        let cart_cleared = match self.store.clear_cart(cart.id).await {
            Ok(_) => {
                progress.advance(FulfillmentState::CartCleared);
                true
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, cart_id = %cart.id, error = %e, "cart not cleared after fulfillment");
                false
            }
        };

        let notification_sent = match self.send_confirmation(&order).await {
            Ok(()) => {
                progress.advance(FulfillmentState::NotificationSent);
                true
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "confirmation email not sent");
                false
            }
        };

        progress.advance(FulfillmentState::Done);
        metrics::counter!("fulfillment_completed").increment(1);
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_price,
            "order fulfilled"
        );

        Ok(FulfillmentOutcome::Fulfilled(Box::new(FulfillmentReceipt {
            event_id: event.id,
            order,
            items: plan.items,
            oversold,
            cart_cleared,
            notification_sent,
            trace: progress.trace,
        })))
    }

    async fn send_confirmation(&self, order: &Order) -> Result<()> {
        let user = self.store.get_user(order.owner).await?.ok_or_else(|| {
            CommerceError::Notification(format!("owner {} has no account", order.owner))
        })?;
        self.notifier
            .send(EmailMessage::order_confirmation(user.email, order))
            .await
    }
}
