//! Translation of carts into hosted payment sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{CartId, UserId};
use domain::DomainError;
use store::Store;

use crate::error::Result;
use crate::services::payment::{
    CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, PaymentProvider,
};

/// Static parameters of every checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            success_url: "http://localhost:3000/checkout/success".to_string(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
        }
    }
}

/// Builds payment sessions from carts.
///
/// Nothing is written: the cart id travels in the session metadata and is
/// read back by the fulfillment pipeline.
pub struct CheckoutBridge<S: Store> {
    store: S,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl<S: Store> CheckoutBridge<S> {
    pub fn new(store: S, provider: Arc<dyn PaymentProvider>, settings: CheckoutSettings) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// Creates a session for the user's cart, creating the cart if needed.
    pub async fn checkout_for_user(&self, user: UserId) -> Result<CheckoutSession> {
        let cart = self.store.get_or_create_cart(user, Utc::now()).await?;
        self.create_checkout_session(cart.id).await
    }

    /// Creates a session priced at the current product prices.
    #[tracing::instrument(skip(self))]
    pub async fn create_checkout_session(&self, cart_id: CartId) -> Result<CheckoutSession> {
        let cart = self
            .store
            .get_cart(cart_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", cart_id))?;
        let items = self.store.list_cart_items(cart.id).await?;
        if items.is_empty() {
            return Err(DomainError::validation("cart", "Cart is empty.").into());
        }

        let ids: Vec<_> = items.iter().map(|item| item.product_id).collect();
        let products: HashMap<_, _> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let line_items = items
            .iter()
            .map(|item| -> Result<CheckoutLineItem> {
                let product = products
                    .get(&item.product_id)
                    .ok_or_else(|| DomainError::not_found("Product", item.product_id))?;
                Ok(CheckoutLineItem {
                    name: product.name.clone(),
                    unit_amount: product.price.cents(),
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let session = self
            .provider
            .create_checkout_session(CheckoutSessionRequest {
                cart_id: cart.id,
                currency: self.settings.currency.clone(),
                line_items,
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
            })
            .await?;

        metrics::counter!("checkout_sessions_created").increment(1);
        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }
}
