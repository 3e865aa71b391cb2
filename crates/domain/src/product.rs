//! Catalog products as seen by the cart and the inventory ledger.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A product listing with its stock level.
///
/// `available` is derived from `stock` and is kept in sync by every
/// constructor and mutator in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub owner: UserId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new listing owned by `owner`.
    pub fn list(
        owner: UserId,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        stock: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name", "This field may not be blank."));
        }
        if price.is_negative() {
            return Err(DomainError::validation(
                "price",
                "Ensure this value is greater than or equal to 0.",
            ));
        }
        let stock = u32::try_from(stock).map_err(|_| {
            DomainError::validation("stock", "Ensure this value is greater than or equal to 0.")
        })?;

        Ok(Self {
            id: ProductId::new(),
            owner,
            name,
            description: description.into(),
            price,
            stock,
            available: stock > 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if at least `quantity` units are in stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        quantity <= self.stock
    }

    /// Price of `quantity` units at the current unit price.
    ///
    /// Fails when the result does not fit in the money range.
    pub fn line_price(&self, quantity: u32) -> Result<Money> {
        self.price
            .checked_mul(quantity)
            .ok_or_else(|| DomainError::validation("quantity", "Line total is too large."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(stock: i64) -> Result<Product> {
        Product::list(
            UserId::new(),
            "Widget",
            "",
            Money::from_cents(1000),
            stock,
            Utc::now(),
        )
    }

    #[test]
    fn availability_follows_stock() {
        assert!(listing(3).unwrap().available);
        assert!(!listing(0).unwrap().available);
    }

    #[test]
    fn negative_stock_is_rejected() {
        let err = listing(-1).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "stock", .. }));
    }

    #[test]
    fn line_price_multiplies_unit_price() {
        let product = listing(5).unwrap();
        assert_eq!(product.line_price(3).unwrap().cents(), 3000);
        assert!(product.has_stock_for(5));
        assert!(!product.has_stock_for(6));
    }

    #[test]
    fn line_price_overflow_is_a_quantity_error() {
        let product = Product::list(
            UserId::new(),
            "Yacht",
            "",
            Money::from_cents(10_000_000_000),
            1,
            Utc::now(),
        )
        .unwrap();
        let err = product.line_price(1_000_000_000).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "quantity", .. }));
    }
}
