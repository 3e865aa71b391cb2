use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, ProductId, UserId};
use domain::{
    Cart, CartItem, FulfillmentPlan, Order, OrderItem, OrderNumber, OrderStatus, Product, Profile,
    User,
};

use crate::Result;

/// Input of an atomic fulfillment.
#[derive(Debug, Clone)]
pub struct FulfillmentRequest {
    /// Provider event id; claimed exactly once.
    pub event_id: String,
    pub event_type: String,
    pub cart_id: CartId,
    pub order_number: OrderNumber,
    pub now: DateTime<Utc>,
}

/// Result of [`Store::commit_fulfillment`].
#[derive(Debug, Clone)]
pub enum FulfillmentCommit {
    /// The order, its items and the stock changes were written.
    Committed(Box<FulfillmentPlan>),
    /// The event id was already claimed by an earlier delivery.
    AlreadyProcessed { order_id: Option<OrderId> },
    /// The cart had no items; nothing was written.
    EmptyCart,
}

/// A unit sold beyond stock, kept for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversellRecord {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub shortfall: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Core trait for store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Lookups return
/// `Ok(None)` for missing rows; only writes that depend on a row report
/// [`StoreError::NotFound`](crate::StoreError::NotFound).
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a user together with its profile, atomically.
    ///
    /// Fails with `Conflict` if the username is taken.
    async fn create_user(&self, user: &User, profile: &Profile) -> Result<()>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn get_profile(&self, owner: UserId) -> Result<Option<Profile>>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads the given products. Missing ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Returns the owner's cart, creating it if absent.
    ///
    /// Repeated and concurrent calls return the same cart.
    async fn get_or_create_cart(&self, owner: UserId, now: DateTime<Utc>) -> Result<Cart>;

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>>;

    async fn get_cart_by_owner(&self, owner: UserId) -> Result<Option<Cart>>;

    /// Items of a cart, oldest first.
    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>>;

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>>;

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>>;

    /// Inserts the item or updates its quantity and line price.
    ///
    /// Fails with `Conflict` if a different item already holds the same
    /// (cart, product) pair.
    async fn save_cart_item(&self, item: &CartItem) -> Result<()>;

    /// Deletes an item of the given cart. Returns false if there was none.
    async fn delete_cart_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool>;

    /// Deletes every item of the cart; the cart itself is kept.
    async fn clear_cart(&self, cart_id: CartId) -> Result<u64>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Orders of `owner`, newest first.
    async fn list_orders(&self, owner: UserId) -> Result<Vec<Order>>;

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Persists `order.status` if the stored status still equals `expected`.
    ///
    /// Fails with `Conflict` otherwise.
    async fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<()>;

    /// Returns the order created for an already processed event, if any.
    async fn processed_event(&self, event_id: &str) -> Result<Option<OrderId>>;

    /// Runs a fulfillment as one unit of work.
    ///
    /// Claims the event id, reads the cart items, locks the products they
    /// reference, and writes the order, its items, the stock changes and any
    /// oversell records. Either everything is written or nothing is.
    async fn commit_fulfillment(&self, request: FulfillmentRequest) -> Result<FulfillmentCommit>;

    /// Oversell records, oldest first.
    async fn list_oversells(&self) -> Result<Vec<OversellRecord>>;
}
