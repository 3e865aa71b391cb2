//! Application services for the storefront.
//!
//! Carts are edited through [`CartService`], turned into hosted payment
//! sessions by [`CheckoutBridge`], and converted into orders by the
//! [`FulfillmentPipeline`] once the payment provider reports a completed
//! checkout:
//! 1. Verify the webhook signature
//! 2. Resolve the cart from the session metadata
//! 3. Create the order, its items and the stock changes in one transaction
//! 4. Clear the cart and send the confirmation email
//!
//! Steps 1 to 3 are all-or-nothing. Failures in step 4 are logged and never
//! undo the committed order.

pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod fulfillment;
pub mod orders;
pub mod services;
pub mod state;
pub mod webhook;

pub use accounts::{AccountService, Registration};
pub use cart::{CartService, CartView};
pub use catalog::{CatalogService, NewProduct};
pub use checkout::{CheckoutBridge, CheckoutSettings};
pub use error::{CommerceError, Result};
pub use fulfillment::{FulfillmentOutcome, FulfillmentPipeline, FulfillmentReceipt};
pub use orders::{OrderDetails, OrderService};
pub use services::{
    CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, EmailMessage,
    InMemoryNotifier, InMemoryPaymentProvider, MailjetNotifier, Notifier, PaymentProvider,
    StripeClient,
};
pub use state::FulfillmentState;
pub use webhook::{CHECKOUT_SESSION_COMPLETED, CheckoutSessionObject, WebhookEvent, WebhookVerifier};
