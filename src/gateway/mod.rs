//! Payment gateway boundary.
//!
//! Outbound: [`PaymentGateway::create_checkout_session`] opens a hosted
//! checkout with a platform fee and a transfer destination. Inbound:
//! [`WebhookVerifier`] authenticates deliveries and [`GatewayEvent`] parses
//! them.
//!
//! [`StripeGateway`] talks to a Stripe-compatible API; [`MockGateway`] serves
//! offline development and tests.

pub mod event;
pub mod mock;
pub mod signature;
pub mod stripe;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MarketError;

pub use event::{AccountObject, ChargeObject, GatewayEvent, SessionObject};
pub use mock::MockGateway;
pub use signature::{SIGNATURE_HEADER, WebhookVerifier};
pub use stripe::StripeGateway;

/// Everything the gateway needs to open one checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    /// Name shown on the single bundle line item.
    pub line_item_name: String,
    /// Total charged, in minor units.
    pub amount: i64,
    /// Lower-case ISO currency code.
    pub currency: String,
    /// Platform fee withheld from the transfer, in minor units.
    pub application_fee: i64,
    /// Connected account that receives the transfer.
    pub destination_account: String,
    /// Opaque key/value pairs echoed back on webhook events.
    pub metadata: Vec<(String, String)>,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect after abandonment.
    pub cancel_url: String,
    /// Requested session expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Our customer id, for the gateway's reconciliation views.
    pub client_reference_id: String,
}

/// Handle returned by the gateway for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Gateway session id.
    pub id: String,
    /// Hosted checkout URL to redirect the customer to.
    pub url: String,
}

/// Outbound payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync + fmt::Debug {
    /// Opens a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::GatewayError`] if the gateway is unreachable or
    /// rejects the request.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, MarketError>;
}
