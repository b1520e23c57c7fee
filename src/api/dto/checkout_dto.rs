//! Checkout and webhook DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{OrderId, SlotId};
use crate::service::{CheckoutRedirect, WebhookOutcome};

/// Request body for `POST /checkout/sessions`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    /// Slots the caller holds in `booked`, all of one provider.
    pub slot_ids: Vec<SlotId>,
}

/// Response body for `POST /checkout/sessions` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSessionResponse {
    /// The new pending order.
    pub order_id: OrderId,
    /// Gateway session id, used to poll the order.
    pub session_id: String,
    /// Hosted checkout URL to redirect to.
    pub url: String,
}

impl From<CheckoutRedirect> for CheckoutSessionResponse {
    fn from(redirect: CheckoutRedirect) -> Self {
        Self {
            order_id: redirect.order_id,
            session_id: redirect.session_id,
            url: redirect.url,
        }
    }
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `true`; failures use an error status instead.
    pub received: bool,
    /// What the delivery did (e.g. `order_paid`, `already_processed`).
    pub outcome: String,
}

impl From<&WebhookOutcome> for WebhookAck {
    fn from(outcome: &WebhookOutcome) -> Self {
        Self {
            received: true,
            outcome: outcome.as_str().to_string(),
        }
    }
}
