//! Order queries and lifecycle changes.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{DomainError, Order, OrderItem, OrderStatus};
use store::Store;

use crate::error::Result;
use crate::services::notification::{EmailMessage, Notifier};

/// An order with its items.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Reads orders and applies client-driven status changes.
///
/// Orders are never created here; see
/// [`FulfillmentPipeline`](crate::FulfillmentPipeline).
pub struct OrderService<S: Store> {
    store: S,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// The user's orders, newest first.
    pub async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(owner).await?)
    }

    /// Loads an order visible to the caller.
    pub async fn get(&self, actor: UserId, is_staff: bool, id: OrderId) -> Result<OrderDetails> {
        let order = self.load(id).await?;
        if !is_staff && !order.is_owned_by(actor) {
            return Err(DomainError::Forbidden(
                "You do not have permission to view this order.".to_string(),
            )
            .into());
        }
        let items = self.store.list_order_items(id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Cancels an order on behalf of its owner.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, actor: UserId, id: OrderId) -> Result<Order> {
        let mut order = self.load(id).await?;
        let previous = order.status;

        order.cancel(actor, Utc::now())?;
        self.store.update_order_status(&order, previous).await?;

        metrics::counter!("orders_cancelled").increment(1);
        tracing::info!(order_id = %order.id, from = %previous, "order cancelled");
        Ok(order)
    }

    /// Moves an order to the next lifecycle status. Staff only.
    ///
    /// The owner is emailed about the change on a best-effort basis.
    #[tracing::instrument(skip(self))]
    pub async fn advance_status(
        &self,
        is_staff: bool,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order> {
        if !is_staff {
            return Err(DomainError::Forbidden(
                "You do not have permission to change the status of this order.".to_string(),
            )
            .into());
        }

        let mut order = self.load(id).await?;
        let previous = order.advance_to(next, Utc::now())?;
        self.store.update_order_status(&order, previous).await?;
        tracing::info!(order_id = %order.id, from = %previous, to = %next, "order status changed");

        self.notify_status_change(&order, previous).await;
        Ok(order)
    }

    async fn notify_status_change(&self, order: &Order, previous: OrderStatus) {
        let recipient = match self.store.get_user(order.owner).await {
            Ok(Some(user)) => user.email,
            Ok(None) => {
                tracing::warn!(order_id = %order.id, "order owner has no account, skipping email");
                return;
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "could not load order owner");
                return;
            }
        };

        let message = EmailMessage::status_changed(recipient, order, previous);
        if let Err(e) = self.notifier.send(message).await {
            tracing::warn!(order_id = %order.id, error = %e, "status change email failed");
        }
    }

    async fn load(&self, id: OrderId) -> Result<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id).into())
    }
}
