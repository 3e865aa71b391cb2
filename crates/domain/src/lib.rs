//! Domain layer for the storefront backend.
//!
//! This crate holds the pure business rules, free of I/O:
//! - Accounts with explicit profile provisioning
//! - Products and the derived availability flag
//! - Cart aggregate with merge-on-add semantics
//! - Order aggregate with its status state machine
//! - Inventory ledger arithmetic and fulfillment planning

pub mod account;
pub mod cart;
pub mod error;
pub mod fulfillment;
pub mod inventory;
pub mod order;
pub mod product;

pub use account::{Profile, User};
pub use cart::{Cart, CartItem, validate_quantity};
pub use error::{DomainError, Result};
pub use fulfillment::{FulfillmentPlan, plan_fulfillment};
pub use inventory::{StockAdjustment, decrement_stock};
pub use order::{Order, OrderItem, OrderNumber, OrderStatus};
pub use product::Product;
