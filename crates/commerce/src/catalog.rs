//! Product listings.

use chrono::Utc;
use common::{Money, ProductId, UserId};
use domain::{DomainError, Product};
use store::Store;

use crate::error::Result;

/// Input for a new listing.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
}

/// Creates and reads product listings.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, owner: UserId, input: NewProduct) -> Result<Product> {
        let product = Product::list(
            owner,
            input.name,
            input.description,
            input.price,
            input.stock,
            Utc::now(),
        )?;
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, "product listed");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id).into())
    }
}
