//! Cart aggregate.
//!
//! A cart belongs to exactly one user and holds at most one line per product.
//! Line prices are denormalized: each line stores `quantity × unit price` as
//! observed when the line was last touched.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::product::Product;

/// A user's in-progress selection. Items are stored separately and keyed by
/// `cart_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub line_price: Money,
    pub added_at: DateTime<Utc>,
}

/// Validates a client-supplied quantity.
pub fn validate_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Err(DomainError::InvalidQuantity { quantity });
    }
    u32::try_from(quantity).map_err(|_| {
        DomainError::validation(
            "quantity",
            "Ensure this value is less than or equal to 4294967295.",
        )
    })
}

impl Cart {
    /// Opens an empty cart for `owner`.
    pub fn open(owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds `quantity` units of `product`.
    ///
    /// `existing` is the cart's current line for the same product, if any.
    /// When present the quantities merge and the line price grows by
    /// `quantity × current unit price`; otherwise a new line is created.
    pub fn add_item(
        &self,
        existing: Option<CartItem>,
        product: &Product,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<CartItem> {
        let quantity = validate_quantity(quantity)?;

        match existing {
            Some(mut item) => {
                debug_assert_eq!(item.cart_id, self.id);
                debug_assert_eq!(item.product_id, product.id);
                item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                    DomainError::validation("quantity", "Resulting quantity is too large.")
                })?;
                item.line_price = item
                    .line_price
                    .checked_add(product.line_price(quantity)?)
                    .ok_or_else(|| DomainError::validation("quantity", "Line total is too large."))?;
                Ok(item)
            }
            None => Ok(CartItem {
                id: CartItemId::new(),
                cart_id: self.id,
                product_id: product.id,
                quantity,
                line_price: product.line_price(quantity)?,
                added_at: now,
            }),
        }
    }
}

impl CartItem {
    /// Replaces the quantity, re-pricing the line at the current unit price.
    ///
    /// On error the item is left untouched.
    pub fn set_quantity(&mut self, product: &Product, quantity: i64) -> Result<()> {
        let quantity = validate_quantity(quantity)?;
        if !product.has_stock_for(quantity) {
            return Err(DomainError::InsufficientStock {
                product_id: product.id.to_string(),
                requested: quantity,
                available: product.stock,
            });
        }
        self.line_price = product.line_price(quantity)?;
        self.quantity = quantity;
        Ok(())
    }
}
