//! Payment provider trait, Stripe client and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::CartId;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::CommerceError;

/// Metadata key carrying the originating cart id.
pub const CART_ID_METADATA_KEY: &str = "cart_id";

/// One line of a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit price in minor units.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Request for a hosted payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub cart_id: CartId,
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    /// Encodes the request as the provider's form fields.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            (
                format!("metadata[{CART_ID_METADATA_KEY}]"),
                self.cart_id.to_string(),
            ),
        ];
        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            fields.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.clone(),
            ));
            fields.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            fields.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            fields.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }
        fields
    }
}

/// Handle of a created payment session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, CommerceError>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Default API base URL.
    pub const DEFAULT_API_BASE: &'static str = "https://api.stripe.com";

    /// Creates a new client authenticating with `secret_key`.
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[tracing::instrument(skip(self, request), fields(cart_id = %request.cart_id))]
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, CommerceError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&request.form_fields())
            .send()
            .await
            .map_err(|e| CommerceError::PaymentProvider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<StripeErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => format!("unexpected status {status}"),
            };
            return Err(CommerceError::PaymentProvider(message));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| CommerceError::PaymentProvider(e.to_string()))
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    requests: Vec<CheckoutSessionRequest>,
    next_id: u32,
}

/// In-memory payment provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryPaymentState>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryPaymentProvider {
    /// Creates a new in-memory payment provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to fail on session creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every request received so far.
    pub async fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.state.read().await.requests.clone()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, CommerceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CommerceError::PaymentProvider(
                "Payment provider unavailable".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = format!("cs_test_{:04}", state.next_id);
        state.requests.push(request);

        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            cart_id: CartId::new(),
            currency: "usd".to_string(),
            line_items: vec![
                CheckoutLineItem {
                    name: "Widget".to_string(),
                    unit_amount: 1000,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Gadget".to_string(),
                    unit_amount: 500,
                    quantity: 1,
                },
            ],
            success_url: "https://shop.test/success".to_string(),
            cancel_url: "https://shop.test/cancel".to_string(),
        }
    }

    #[test]
    fn test_form_fields_encode_lines_and_metadata() {
        let request = request();
        let fields = request.form_fields();
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("metadata[cart_id]"), Some(request.cart_id.to_string().as_str()));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1000"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[1][price_data][product_data][name]"), Some("Gadget"));
        assert_eq!(get("line_items[1][price_data][currency]"), Some("usd"));
    }

    #[tokio::test]
    async fn test_in_memory_provider_records_requests() {
        let provider = InMemoryPaymentProvider::new();
        let session = provider.create_checkout_session(request()).await.unwrap();

        assert_eq!(session.id, "cs_test_0001");
        assert!(session.url.ends_with("cs_test_0001"));
        assert_eq!(provider.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_provider_failure() {
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on_create(true);

        let result = provider.create_checkout_session(request()).await;
        assert!(matches!(result, Err(CommerceError::PaymentProvider(_))));
        assert!(provider.requests().await.is_empty());
    }
}
