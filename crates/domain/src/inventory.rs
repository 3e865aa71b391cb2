//! Inventory ledger arithmetic.
//!
//! Stock is only ever decremented during fulfillment. There is no hold or
//! reservation phase, so two paid checkouts may race for the last units; the
//! ledger never lets stock drop below zero and reports the shortfall instead.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::product::Product;

/// Outcome of decrementing one product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub previous_stock: u32,
    pub requested: u32,
    pub new_stock: u32,
    pub available: bool,
}

impl StockAdjustment {
    /// Units sold beyond what was in stock.
    pub fn shortfall(&self) -> u32 {
        self.requested.saturating_sub(self.previous_stock)
    }

    /// Returns true if the sale exceeded the stock on hand.
    pub fn is_oversold(&self) -> bool {
        self.shortfall() > 0
    }
}

/// Removes `quantity` units from `product`, clamping at zero and keeping the
/// availability flag in step with the resulting stock.
pub fn decrement_stock(product: &mut Product, quantity: u32, now: DateTime<Utc>) -> StockAdjustment {
    let previous_stock = product.stock;
    product.stock = previous_stock.saturating_sub(quantity);
    product.available = product.stock > 0;
    product.updated_at = now;

    let adjustment = StockAdjustment {
        product_id: product.id,
        previous_stock,
        requested: quantity,
        new_stock: product.stock,
        available: product.available,
    };

    if adjustment.is_oversold() {
        tracing::warn!(
            product_id = %product.id,
            requested = quantity,
            in_stock = previous_stock,
            shortfall = adjustment.shortfall(),
            "product oversold, stock clamped to zero"
        );
    }

    adjustment
}
