//! Notification gateway trait, Mailjet client and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Order, OrderStatus};
use serde_json::json;
use tokio::sync::RwLock;

use crate::error::CommerceError;

/// A transactional email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Confirmation sent once an order has been fulfilled.
    pub fn order_confirmation(to: impl Into<String>, order: &Order) -> Self {
        Self {
            to: to.into(),
            subject: format!("Order Confirmation - {}", order.order_number),
            body: format!(
                "Thank you for your order!\n\nOrder number: {}\nTotal: {}\n",
                order.order_number, order.total_price
            ),
        }
    }

    /// Notice sent when staff moves an order to a new status.
    pub fn status_changed(to: impl Into<String>, order: &Order, previous: OrderStatus) -> Self {
        Self {
            to: to.into(),
            subject: format!("Order {} is now {}", order.order_number, order.status),
            body: format!(
                "Your order {} changed from {} to {}.\n",
                order.order_number, previous, order.status
            ),
        }
    }
}

/// Trait for sending transactional email.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), CommerceError>;
}

/// Mailjet v3.1 send API client.
#[derive(Clone)]
pub struct MailjetNotifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: String,
    from_email: String,
}

impl std::fmt::Debug for MailjetNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailjetNotifier")
            .field("endpoint", &self.endpoint)
            .field("from_email", &self.from_email)
            .finish_non_exhaustive()
    }
}

impl MailjetNotifier {
    /// Public send endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.mailjet.com/v3.1/send";

    /// Creates a new client sending from `from_email`.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        from_email: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            from_email: from_email.into(),
        }
    }
}

#[async_trait]
impl Notifier for MailjetNotifier {
    #[tracing::instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: EmailMessage) -> Result<(), CommerceError> {
        let body = json!({
            "Messages": [{
                "From": { "Email": self.from_email },
                "To": [{ "Email": message.to }],
                "Subject": message.subject,
                "TextPart": message.body,
            }]
        });

        self.http
            .post(&self.endpoint)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CommerceError::Notification(e.to_string()))?;

        Ok(())
    }
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<EmailMessage>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail on send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every message accepted so far.
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), CommerceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CommerceError::Notification(
                "Mail gateway unavailable".to_string(),
            ));
        }
        self.sent.write().await.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Money, UserId};
    use domain::OrderNumber;

    fn order() -> Order {
        Order::place(
            UserId::new(),
            OrderNumber::from_stored("ABCDEF0123456789ABCD"),
            Money::from_cents(2500),
            Utc::now(),
        )
    }

    #[test]
    fn test_confirmation_mentions_number_and_total() {
        let message = EmailMessage::order_confirmation("a@example.com", &order());
        assert_eq!(message.to, "a@example.com");
        assert!(message.subject.contains("ABCDEF0123456789ABCD"));
        assert!(message.body.contains("25.00"));
    }

    #[test]
    fn test_status_change_mentions_both_statuses() {
        let mut order = order();
        order.status = OrderStatus::Shipped;
        let message = EmailMessage::status_changed("a@example.com", &order, OrderStatus::Processing);
        assert!(message.body.contains("Processing"));
        assert!(message.body.contains("Shipped"));
    }

    #[tokio::test]
    async fn test_in_memory_notifier() {
        let notifier = InMemoryNotifier::new();
        notifier
            .send(EmailMessage::order_confirmation("a@example.com", &order()))
            .await
            .unwrap();
        assert_eq!(notifier.sent().await.len(), 1);

        notifier.set_fail_on_send(true);
        let result = notifier
            .send(EmailMessage::order_confirmation("a@example.com", &order()))
            .await;
        assert!(matches!(result, Err(CommerceError::Notification(_))));
        assert_eq!(notifier.sent().await.len(), 1);
    }
}
