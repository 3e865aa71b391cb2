//! Shared types for the storefront backend.
//!
//! Typed identifiers keep the different UUID-keyed entities apart, and
//! [`Money`] carries prices in integer minor units.

mod money;
mod types;

pub use money::Money;
pub use types::{CartId, CartItemId, OrderId, OrderItemId, ProductId, UserId};
