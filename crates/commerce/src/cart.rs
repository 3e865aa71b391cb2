//! Cart use cases.

use chrono::Utc;
use common::{CartItemId, Money, ProductId, UserId};
use domain::{Cart, CartItem, DomainError};
use store::Store;

use crate::error::Result;

/// A cart with its items.
#[derive(Debug, Clone)]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

impl CartView {
    /// Sum of the stored line prices.
    pub fn total(&self) -> Result<Money> {
        Money::checked_sum(self.items.iter().map(|item| item.line_price))
            .ok_or_else(|| DomainError::validation("cart", "Cart total is too large.").into())
    }
}

/// Edits the caller's cart.
///
/// Concurrent edits of the same cart are last-write-wins.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's cart, creating it on first use.
    pub async fn get_or_create_cart(&self, user: UserId) -> Result<Cart> {
        Ok(self.store.get_or_create_cart(user, Utc::now()).await?)
    }

    pub async fn view(&self, user: UserId) -> Result<CartView> {
        let cart = self.get_or_create_cart(user).await?;
        let items = self.store.list_cart_items(cart.id).await?;
        Ok(CartView { cart, items })
    }

    /// Adds `quantity` units of a product, merging into an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;
        let cart = self.get_or_create_cart(user).await?;
        let existing = self.store.find_cart_item(cart.id, product_id).await?;

        let item = cart.add_item(existing, &product, quantity, Utc::now())?;
        self.store.save_cart_item(&item).await?;

        tracing::debug!(item_id = %item.id, quantity = item.quantity, "cart item saved");
        Ok(item)
    }

    /// Removes an item from the user's cart. Unknown items are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user: UserId, item_id: CartItemId) -> Result<()> {
        if let Some(cart) = self.store.get_cart_by_owner(user).await? {
            self.store.delete_cart_item(cart.id, item_id).await?;
        }
        Ok(())
    }

    /// Replaces an item's quantity, re-pricing it at the current unit price.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user: UserId,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<CartItem> {
        let cart = self
            .store
            .get_cart_by_owner(user)
            .await?
            .ok_or_else(|| DomainError::not_found("CartItem", item_id))?;
        let mut item = self
            .store
            .get_cart_item(item_id)
            .await?
            .filter(|item| item.cart_id == cart.id)
            .ok_or_else(|| DomainError::not_found("CartItem", item_id))?;
        let product = self
            .store
            .get_product(item.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", item.product_id))?;

        item.set_quantity(&product, quantity)?;
        self.store.save_cart_item(&item).await?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommerceError;
    use domain::Product;
    use store::InMemoryStore;

    async fn setup(price_cents: i64, stock: i64) -> (CartService<InMemoryStore>, InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = Product::list(
            UserId::new(),
            "Widget",
            "",
            Money::from_cents(price_cents),
            stock,
            Utc::now(),
        )
        .unwrap();
        store.insert_product(&product).await.unwrap();
        (CartService::new(store.clone()), store, product)
    }

    #[tokio::test]
    async fn test_cart_is_created_lazily_once() {
        let (service, _, _) = setup(100, 1).await;
        let user = UserId::new();

        let first = service.get_or_create_cart(user).await.unwrap();
        let second = service.get_or_create_cart(user).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_re_adding_merges_lines() {
        let (service, _, product) = setup(1000, 10).await;
        let user = UserId::new();

        service.add_item(user, product.id, 2).await.unwrap();
        let merged = service.add_item(user, product.id, 3).await.unwrap();

        let view = service.view(user).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(merged.quantity, 5);
        assert_eq!(view.total().unwrap().cents(), 5000);
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let (service, _, _) = setup(1000, 10).await;
        let err = service
            .add_item(UserId::new(), ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::NotFound { entity: "Product", .. })
        ));
    }

    #[tokio::test]
    async fn test_add_rejects_zero_quantity() {
        let (service, _, product) = setup(1000, 10).await;
        let err = service
            .add_item(UserId::new(), product.id, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[tokio::test]
    async fn test_update_quantity_above_stock_keeps_previous() {
        let (service, store, product) = setup(1000, 3).await;
        let user = UserId::new();
        let item = service.add_item(user, product.id, 2).await.unwrap();

        let err = service.update_quantity(user, item.id, 4).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::InsufficientStock { .. })
        ));
        let stored = store.get_cart_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 2);
    }

    #[tokio::test]
    async fn test_update_quantity_reprices() {
        let (service, _, product) = setup(1000, 10).await;
        let user = UserId::new();
        let item = service.add_item(user, product.id, 1).await.unwrap();

        let updated = service.update_quantity(user, item.id, 4).await.unwrap();
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.line_price.cents(), 4000);
    }

    #[tokio::test]
    async fn test_cannot_touch_someone_elses_item() {
        let (service, store, product) = setup(1000, 10).await;
        let owner = UserId::new();
        let intruder = UserId::new();
        let item = service.add_item(owner, product.id, 1).await.unwrap();
        service.get_or_create_cart(intruder).await.unwrap();

        let err = service
            .update_quantity(intruder, item.id, 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::NotFound { .. })
        ));

        service.remove_item(intruder, item.id).await.unwrap();
        assert!(store.get_cart_item(item.id).await.unwrap().is_some());

        service.remove_item(owner, item.id).await.unwrap();
        assert!(store.get_cart_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_item_rejects_line_total_overflow() {
        let (service, store, product) = setup(10_000_000_000, 1).await;
        let user = UserId::new();

        let err = service
            .add_item(user, product.id, 1_000_000_000)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::Validation { field: "quantity", .. })
        ));
        let cart = store.get_cart_by_owner(user).await.unwrap().unwrap();
        assert!(store.list_cart_items(cart.id).await.unwrap().is_empty());
    }
}
