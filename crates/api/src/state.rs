//! Shared application state and its external collaborators.

use std::sync::Arc;

use commerce::{
    AccountService, CartService, CatalogService, CheckoutBridge, CheckoutSettings,
    FulfillmentPipeline, InMemoryNotifier, InMemoryPaymentProvider, MailjetNotifier, Notifier,
    OrderService, PaymentProvider, StripeClient, WebhookVerifier,
};
use store::Store;

use crate::config::Config;

/// External services the application talks to.
///
/// Built once at start-up and injected into the services that need them.
#[derive(Clone)]
pub struct Services {
    pub payments: Arc<dyn PaymentProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub verifier: WebhookVerifier,
    pub checkout: CheckoutSettings,
}

impl Services {
    /// In-memory payment and mail doubles with the given webhook secret.
    pub fn in_memory(webhook_secret: impl Into<String>) -> Self {
        Self {
            payments: Arc::new(InMemoryPaymentProvider::new()),
            notifier: Arc::new(InMemoryNotifier::new()),
            verifier: WebhookVerifier::new(
                webhook_secret,
                commerce::webhook::DEFAULT_TOLERANCE_SECS,
            ),
            checkout: CheckoutSettings::default(),
        }
    }

    /// Wires the HTTP clients for which credentials are configured and the
    /// in-memory doubles for the rest.
    pub fn from_config(config: &Config) -> Self {
        let payments: Arc<dyn PaymentProvider> = match &config.stripe_secret_key {
            Some(key) => Arc::new(StripeClient::new(key.clone(), config.stripe_api_base.clone())),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set, using the in-memory payment provider");
                Arc::new(InMemoryPaymentProvider::new())
            }
        };

        let notifier: Arc<dyn Notifier> =
            match (&config.mailjet_api_key, &config.mailjet_api_secret) {
                (Some(key), Some(secret)) => Arc::new(MailjetNotifier::new(
                    key.clone(),
                    secret.clone(),
                    config.default_from_email.clone(),
                )),
                _ => {
                    tracing::warn!("Mailjet credentials not set, emails will not be delivered");
                    Arc::new(InMemoryNotifier::new())
                }
            };

        let webhook_secret = match &config.stripe_webhook_secret {
            Some(secret) => secret.clone(),
            None => {
                // A random secret nobody knows, so every delivery is rejected.
                tracing::warn!("STRIPE_WEBHOOK_SECRET not set, payment webhooks will be rejected");
                format!("whsec_{}", uuid::Uuid::new_v4().simple())
            }
        };

        Self {
            payments,
            notifier,
            verifier: WebhookVerifier::new(webhook_secret, config.webhook_tolerance_secs),
            checkout: CheckoutSettings {
                currency: config.currency.clone(),
                success_url: config.checkout_success_url.clone(),
                cancel_url: config.checkout_cancel_url.clone(),
            },
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub checkout: CheckoutBridge<S>,
    pub orders: OrderService<S>,
    pub fulfillment: FulfillmentPipeline<S>,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, services: Services) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            checkout: CheckoutBridge::new(store.clone(), services.payments, services.checkout),
            orders: OrderService::new(store.clone(), services.notifier.clone()),
            fulfillment: FulfillmentPipeline::new(store, services.verifier, services.notifier),
        }
    }
}
