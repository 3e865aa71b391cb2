//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

use super::{OrderNumber, OrderStatus};

/// Order aggregate root.
///
/// Orders are only ever created by the fulfillment pipeline. Afterwards the
/// only mutation is a status change; once the order is `Delivered` or
/// `Cancelled` nothing changes anymore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: UserId,
    pub order_number: OrderNumber,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order.
///
/// `price` is the line total captured at fulfillment time and never changes
/// afterwards, whatever happens to the product's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

impl Order {
    /// Creates a pending order.
    pub fn place(
        owner: UserId,
        order_number: OrderNumber,
        total_price: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            owner,
            order_number,
            total_price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if `user` owns this order.
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }

    /// Cancels the order on behalf of `actor`.
    ///
    /// Only the owner may cancel, and only while the order is `Pending` or
    /// `Processing`.
    pub fn cancel(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<()> {
        if !self.is_owned_by(actor) {
            return Err(DomainError::Forbidden(
                "You do not have permission to cancel this order.".to_string(),
            ));
        }
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::ImmutableOrder {
                status: self.status,
            });
        }
        if !self.status.can_cancel() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Moves the order one step along the fulfilment path.
    ///
    /// Returns the previous status on success.
    pub fn advance_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<OrderStatus> {
        if self.status.is_terminal() {
            return Err(DomainError::ImmutableOrder {
                status: self.status,
            });
        }
        if self.status.successor() != Some(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let previous = self.status;
        self.status = next;
        self.updated_at = now;
        Ok(previous)
    }
}
