//! Payment webhook verification and typed payloads.
//!
//! The provider signs every delivery with a `Stripe-Signature` header of the
//! form `t=<unix seconds>,v1=<hex hmac>`, where the HMAC-SHA256 is computed
//! over `"<t>.<raw body>"` with the endpoint's shared secret. Several `v1`
//! entries may be present while secrets are being rolled.

use std::collections::HashMap;

use chrono::Utc;
use common::CartId;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{CommerceError, Result};
use crate::services::payment::CART_ID_METADATA_KEY;

type HmacSha256 = Hmac<Sha256>;

/// Event type that triggers fulfillment.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Default replay window in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// The session object carried by `checkout.session.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

impl WebhookEvent {
    /// Returns true if this event should trigger fulfillment.
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// Interprets the event object as a checkout session.
    pub fn checkout_session(&self) -> Result<CheckoutSessionObject> {
        CheckoutSessionObject::deserialize(&self.data.object)
            .map_err(|e| CommerceError::MalformedEvent(e.to_string()))
    }
}

impl CheckoutSessionObject {
    /// The cart this session was created for.
    pub fn cart_id(&self) -> Result<CartId> {
        let raw = self.metadata.get(CART_ID_METADATA_KEY).ok_or_else(|| {
            CommerceError::MalformedEvent(format!("session {} has no cart_id metadata", self.id))
        })?;
        raw.parse().map_err(|_| {
            CommerceError::MalformedEvent(format!("session {} has invalid cart_id {raw:?}", self.id))
        })
    }
}

/// Verifies webhook signatures with the endpoint's shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Creates a verifier accepting signatures up to `tolerance_secs` old.
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| CommerceError::SignatureInvalid(e.to_string()))
    }

    /// Builds a signature header for `payload`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        Ok(format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Verifies `header` against `payload` at the current time.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verifies `header` against `payload` as if the current time were `now`.
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            CommerceError::SignatureInvalid("missing or invalid timestamp".to_string())
        })?;
        if signatures.is_empty() {
            return Err(CommerceError::SignatureInvalid(
                "no v1 signature in header".to_string(),
            ));
        }
        let within_tolerance = now.checked_sub(timestamp).is_some_and(|age| {
            u64::try_from(self.tolerance_secs).is_ok_and(|limit| age.unsigned_abs() <= limit)
        });
        if !within_tolerance {
            return Err(CommerceError::SignatureInvalid(
                "timestamp outside the tolerance window".to_string(),
            ));
        }

        for signature in signatures {
            let Ok(expected) = hex::decode(signature) else {
                continue;
            };
            let mut mac = self.mac()?;
            mac.update(format!("{timestamp}.").as_bytes());
            mac.update(payload);
            if mac.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }

        Err(CommerceError::SignatureInvalid(
            "no signature matches the payload".to_string(),
        ))
    }

    /// Verifies the signature and parses the event.
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<WebhookEvent> {
        self.verify(payload, header)?;
        serde_json::from_slice(payload).map_err(|e| CommerceError::MalformedEvent(e.to_string()))
    }
}
