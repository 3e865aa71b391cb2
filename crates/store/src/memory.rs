use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, ProductId, UserId};
use domain::{
    Cart, CartItem, Order, OrderItem, OrderStatus, Product, Profile, User, plan_fulfillment,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{FulfillmentCommit, FulfillmentRequest, OversellRecord, Store},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    profiles: HashMap<UserId, Profile>,
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, Cart>,
    cart_items: Vec<CartItem>,
    orders: HashMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    processed_events: HashMap<String, OrderId>,
    oversells: Vec<OversellRecord>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_commit: AtomicBool,
    fail_on_clear: AtomicBool,
}

/// In-memory store implementation for testing.
///
/// Every operation takes the single table lock, which serializes
/// fulfillments the same way row locks do in PostgreSQL.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next fulfillment commits fail before writing anything.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Makes cart clearing fail.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.faults.fail_on_clear.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, user: &User, profile: &Profile) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} is already taken",
                user.username
            )));
        }
        tables.users.insert(user.id, user.clone());
        tables.profiles.insert(profile.owner, profile.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_profile(&self, owner: UserId) -> Result<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&owner).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn get_or_create_cart(&self, owner: UserId, now: DateTime<Utc>) -> Result<Cart> {
        let mut tables = self.tables.write().await;
        if let Some(cart) = tables.carts.values().find(|c| c.owner == owner) {
            return Ok(cart.clone());
        }
        let cart = Cart::open(owner, now);
        tables.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(&id).cloned())
    }

    async fn get_cart_by_owner(&self, owner: UserId) -> Result<Option<Cart>> {
        let tables = self.tables.read().await;
        Ok(tables.carts.values().find(|c| c.owner == owner).cloned())
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
            .cloned())
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>> {
        let tables = self.tables.read().await;
        Ok(tables.cart_items.iter().find(|item| item.id == id).cloned())
    }

    async fn save_cart_item(&self, item: &CartItem) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.carts.contains_key(&item.cart_id) {
            return Err(StoreError::not_found("Cart", item.cart_id));
        }
        if tables
            .cart_items
            .iter()
            .any(|i| i.id != item.id && i.cart_id == item.cart_id && i.product_id == item.product_id)
        {
            return Err(StoreError::Conflict(format!(
                "cart {} already holds product {}",
                item.cart_id, item.product_id
            )));
        }

        match tables.cart_items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                existing.quantity = item.quantity;
                existing.line_price = item.line_price;
            }
            None => tables.cart_items.push(item.clone()),
        }
        if let Some(cart) = tables.carts.get_mut(&item.cart_id) {
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_cart_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|item| !(item.id == item_id && item.cart_id == cart_id));
        Ok(tables.cart_items.len() != before)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<u64> {
        if self.faults.fail_on_clear.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cart clear rejected".to_string()));
        }
        let mut tables = self.tables.write().await;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|item| item.cart_id != cart_id);
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, owner: UserId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.owner == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::not_found("Order", order.id))?;
        if stored.status != expected {
            return Err(StoreError::Conflict(format!(
                "order {} is {}, expected {}",
                order.id, stored.status, expected
            )));
        }
        stored.status = order.status;
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn processed_event(&self, event_id: &str) -> Result<Option<OrderId>> {
        Ok(self
            .tables
            .read()
            .await
            .processed_events
            .get(event_id)
            .copied())
    }

    async fn commit_fulfillment(&self, request: FulfillmentRequest) -> Result<FulfillmentCommit> {
        let mut tables = self.tables.write().await;

        if self.faults.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "fulfillment commit rejected".to_string(),
            ));
        }
        if let Some(order_id) = tables.processed_events.get(&request.event_id) {
            return Ok(FulfillmentCommit::AlreadyProcessed {
                order_id: Some(*order_id),
            });
        }

        let cart = tables
            .carts
            .get(&request.cart_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Cart", request.cart_id))?;
        let lines: Vec<CartItem> = tables
            .cart_items
            .iter()
            .filter(|item| item.cart_id == cart.id)
            .cloned()
            .collect();
        if lines.is_empty() {
            return Ok(FulfillmentCommit::EmptyCart);
        }

        let mut products: HashMap<ProductId, Product> = lines
            .iter()
            .filter_map(|line| tables.products.get(&line.product_id))
            .map(|p| (p.id, p.clone()))
            .collect();

        let plan = plan_fulfillment(
            cart.owner,
            request.order_number,
            &lines,
            &mut products,
            request.now,
        )?;

        // Nothing below this line can fail.

        tables.products.extend(products);
        tables.orders.insert(plan.order.id, plan.order.clone());
        tables.order_items.extend(plan.items.iter().cloned());
        let oversells: Vec<_> = plan
            .oversold()
            .map(|adj| OversellRecord {
                order_id: plan.order.id,
                product_id: adj.product_id,
                shortfall: adj.shortfall(),
                recorded_at: request.now,
            })
            .collect();
        tables.oversells.extend(oversells);
        tables
            .processed_events
            .insert(request.event_id, plan.order.id);

        Ok(FulfillmentCommit::Committed(Box::new(plan)))
    }

    async fn list_oversells(&self) -> Result<Vec<OversellRecord>> {
        Ok(self.tables.read().await.oversells.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use domain::OrderNumber;

    async fn seeded_cart(store: &InMemoryStore, lines: &[(i64, i64, i64)]) -> (Cart, Vec<Product>) {
        let owner = UserId::new();
        let cart = store.get_or_create_cart(owner, Utc::now()).await.unwrap();
        let mut products = Vec::new();
        for &(price, stock, quantity) in lines {
            let product =
                Product::list(owner, "Item", "", Money::from_cents(price), stock, Utc::now())
                    .unwrap();
            store.insert_product(&product).await.unwrap();
            let item = cart.add_item(None, &product, quantity, Utc::now()).unwrap();
            store.save_cart_item(&item).await.unwrap();
            products.push(product);
        }
        (cart, products)
    }

    fn request(event_id: &str, cart_id: CartId) -> FulfillmentRequest {
        FulfillmentRequest {
            event_id: event_id.to_string(),
            event_type: "checkout.session.completed".to_string(),
            cart_id,
            order_number: OrderNumber::generate(),
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_or_create_cart_is_idempotent() {
        let store = InMemoryStore::new();
        let owner = UserId::new();

        let first = store.get_or_create_cart(owner, Utc::now()).await.unwrap();
        let second = store.get_or_create_cart(owner, Utc::now()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            store.get_cart_by_owner(owner).await.unwrap().map(|c| c.id),
            Some(first.id)
        );
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = InMemoryStore::new();
        let alice = User::register("alice", "alice@example.com", Utc::now()).unwrap();
        store
            .create_user(&alice, &Profile::provision(&alice))
            .await
            .unwrap();

        let again = User::register("alice", "other@example.com", Utc::now()).unwrap();
        let result = store.create_user(&again, &Profile::provision(&again)).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(store.get_profile(alice.id).await.unwrap().is_some());
        assert!(store.get_user(again.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_line_for_same_product_conflicts() {
        let store = InMemoryStore::new();
        let (cart, products) = seeded_cart(&store, &[(100, 5, 1)]).await;

        let duplicate = cart.add_item(None, &products[0], 1, Utc::now()).unwrap();
        let result = store.save_cart_item(&duplicate).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_cart_items(cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_only_touches_own_cart() {
        let store = InMemoryStore::new();
        let (cart, _) = seeded_cart(&store, &[(100, 5, 1)]).await;
        let item = store.list_cart_items(cart.id).await.unwrap()[0].clone();

        assert!(!store.delete_cart_item(CartId::new(), item.id).await.unwrap());
        assert!(store.delete_cart_item(cart.id, item.id).await.unwrap());
        assert!(!store.delete_cart_item(cart.id, item.id).await.unwrap());
    }

    #[tokio::test]
    async fn commit_writes_order_items_and_stock() {
        let store = InMemoryStore::new();
        let (cart, products) = seeded_cart(&store, &[(1000, 5, 2), (500, 1, 1)]).await;

        let commit = store
            .commit_fulfillment(request("evt_1", cart.id))
            .await
            .unwrap();
        let FulfillmentCommit::Committed(plan) = commit else {
            panic!("expected a committed fulfillment");
        };

        assert_eq!(plan.order.total_price.cents(), 2500);
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.list_order_items(plan.order.id).await.unwrap().len(), 2);
        assert_eq!(store.processed_event("evt_1").await.unwrap(), Some(plan.order.id));

        let a = store.get_product(products[0].id).await.unwrap().unwrap();
        let b = store.get_product(products[1].id).await.unwrap().unwrap();
        assert_eq!(a.stock, 3);
        assert_eq!(b.stock, 0);
        assert!(!b.available);
    }

    #[tokio::test]
    async fn commit_twice_reports_already_processed() {
        let store = InMemoryStore::new();
        let (cart, _) = seeded_cart(&store, &[(1000, 5, 1)]).await;

        store
            .commit_fulfillment(request("evt_1", cart.id))
            .await
            .unwrap();
        let second = store
            .commit_fulfillment(request("evt_1", cart.id))
            .await
            .unwrap();

        assert!(matches!(
            second,
            FulfillmentCommit::AlreadyProcessed { order_id: Some(_) }
        ));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn commit_on_empty_cart_writes_nothing() {
        let store = InMemoryStore::new();
        let (cart, _) = seeded_cart(&store, &[]).await;

        let commit = store
            .commit_fulfillment(request("evt_1", cart.id))
            .await
            .unwrap();
        assert!(matches!(commit, FulfillmentCommit::EmptyCart));
        assert_eq!(store.processed_event("evt_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversell_is_recorded() {
        let store = InMemoryStore::new();
        let (cart, products) = seeded_cart(&store, &[(100, 1, 4)]).await;

        store
            .commit_fulfillment(request("evt_1", cart.id))
            .await
            .unwrap();

        let product = store.get_product(products[0].id).await.unwrap().unwrap();
        assert_eq!(product.stock, 0);
        let oversells = store.list_oversells().await.unwrap();
        assert_eq!(oversells.len(), 1);
        assert_eq!(oversells[0].shortfall, 3);
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let store = InMemoryStore::new();
        let (cart, products) = seeded_cart(&store, &[(100, 5, 1)]).await;
        store.set_fail_on_commit(true);

        let result = store.commit_fulfillment(request("evt_1", cart.id)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.processed_event("evt_1").await.unwrap(), None);
        let product = store.get_product(products[0].id).await.unwrap().unwrap();
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn status_update_is_compare_and_set() {
        let store = InMemoryStore::new();
        let (cart, _) = seeded_cart(&store, &[(100, 5, 1)]).await;
        let FulfillmentCommit::Committed(plan) = store
            .commit_fulfillment(request("evt_1", cart.id))
            .await
            .unwrap()
        else {
            panic!("expected a committed fulfillment");
        };

        let mut order = plan.order.clone();
        order.advance_to(OrderStatus::Processing, Utc::now()).unwrap();
        store
            .update_order_status(&order, OrderStatus::Pending)
            .await
            .unwrap();

        let stale = store.update_order_status(&order, OrderStatus::Pending).await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn saving_items_touches_cart() {
        let store = InMemoryStore::new();
        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        let cart = store
            .get_or_create_cart(UserId::new(), an_hour_ago)
            .await
            .unwrap();
        let product =
            Product::list(cart.owner, "Item", "", Money::from_cents(100), 5, Utc::now()).unwrap();
        store.insert_product(&product).await.unwrap();

        let item = cart.add_item(None, &product, 1, Utc::now()).unwrap();
        store.save_cart_item(&item).await.unwrap();
        let added = store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(added.updated_at > an_hour_ago);

        let merged = cart.add_item(Some(item), &product, 1, Utc::now()).unwrap();
        store.save_cart_item(&merged).await.unwrap();
        let touched = store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(touched.updated_at >= added.updated_at);
        assert_eq!(touched.created_at, an_hour_ago);
    }
}
