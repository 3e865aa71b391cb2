//! Fulfillment planning.
//!
//! Turns a cart snapshot plus the current product rows into the complete set
//! of writes a fulfillment must commit atomically: one order, one item per
//! product, and one stock adjustment per product.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{Money, OrderItemId, ProductId, UserId};

use crate::cart::CartItem;
use crate::error::{DomainError, Result};
use crate::inventory::{StockAdjustment, decrement_stock};
use crate::order::{Order, OrderItem, OrderNumber};
use crate::product::Product;

/// Everything a fulfillment writes.
#[derive(Debug, Clone)]
pub struct FulfillmentPlan {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub adjustments: Vec<StockAdjustment>,
}

impl FulfillmentPlan {
    /// Stock adjustments that sold more than was on hand.
    pub fn oversold(&self) -> impl Iterator<Item = &StockAdjustment> {
        self.adjustments.iter().filter(|adj| adj.is_oversold())
    }
}

/// Prices `lines` at the current product prices and applies the stock
/// decrements to `products`.
///
/// Lines for the same product are folded together so the order holds at most
/// one item per product. Every product is checked before anything is
/// mutated, so on error `products` is left untouched.
pub fn plan_fulfillment(
    owner: UserId,
    order_number: OrderNumber,
    lines: &[CartItem],
    products: &mut HashMap<ProductId, Product>,
    now: DateTime<Utc>,
) -> Result<FulfillmentPlan> {
    if lines.is_empty() {
        return Err(DomainError::validation("cart", "Cart is empty."));
    }

    let mut quantities: Vec<(ProductId, u32)> = Vec::with_capacity(lines.len());
    for line in lines {
        match quantities.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
                    DomainError::validation("quantity", "Resulting quantity is too large.")
                })?;
            }
            None => quantities.push((line.product_id, line.quantity)),
        }
    }

    let mut priced = Vec::with_capacity(quantities.len());
    for (product_id, quantity) in &quantities {
        let product = products
            .get(product_id)
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;
        priced.push((*product_id, *quantity, product.line_price(*quantity)?));
    }

    let total = Money::checked_sum(priced.iter().map(|(_, _, price)| *price))
        .ok_or_else(|| DomainError::validation("quantity", "Order total is too large."))?;
    let order = Order::place(owner, order_number, total, now);

    let mut items = Vec::with_capacity(priced.len());
    let mut adjustments = Vec::with_capacity(priced.len());
    for (product_id, quantity, price) in priced {
        items.push(OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            product_id,
            quantity,
            price,
        });
        if let Some(product) = products.get_mut(&product_id) {
            adjustments.push(decrement_stock(product, quantity, now));
        }
    }

    Ok(FulfillmentPlan {
        order,
        items,
        adjustments,
    })
}
