//! Persistence layer.
//!
//! The [`Store`] trait is the only way the application touches state. Two
//! implementations are provided: [`InMemoryStore`] for tests and local runs,
//! and [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{FulfillmentCommit, FulfillmentRequest, OversellRecord, Store};
