//! External service traits with HTTP and in-memory implementations.

pub mod notification;
pub mod payment;

pub use notification::{EmailMessage, InMemoryNotifier, MailjetNotifier, Notifier};
pub use payment::{
    CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, InMemoryPaymentProvider,
    PaymentProvider, StripeClient,
};
