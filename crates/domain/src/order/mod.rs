//! Order aggregate and related types.

mod aggregate;
mod number;
mod state;

pub use aggregate::{Order, OrderItem};
pub use number::OrderNumber;
pub use state::OrderStatus;
