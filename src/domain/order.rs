//! Order: the payment record covering one or more slots of a single provider.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{OrderId, ProviderId, SlotId, UserId};

/// Payment state of an [`Order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Checkout session opened, payment outstanding.
    Pending,
    /// Gateway confirmed completion.
    Paid,
    /// Checkout session expired before completion.
    Canceled,
    /// Refunded out-of-band after payment.
    Refunded,
}

impl OrderStatus {
    /// Returns the storage/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "canceled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Payment record.
///
/// `amount` is computed once at creation from the slots' price snapshots and
/// is never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Paying customer.
    pub customer_id: UserId,
    /// Single payee of this order.
    pub provider_id: ProviderId,
    /// Slots covered, in cart order.
    pub slot_ids: Vec<SlotId>,
    /// Total in minor currency units.
    pub amount: i64,
    /// ISO currency code, lower-case.
    pub currency: String,
    /// Platform fee in minor currency units.
    pub platform_fee: i64,
    /// Gateway account receiving the transfer.
    pub destination_account: String,
    /// Gateway checkout session id, set once the session is opened.
    pub checkout_session_id: Option<String>,
    /// Gateway payment intent id, set on completion.
    pub payment_intent_id: Option<String>,
    /// Receipt URL reported by the gateway.
    pub receipt_url: Option<String>,
    /// Payment state.
    pub status: OrderStatus,
    /// End of the reservation hold shown to the customer.
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for opening a `pending` order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Paying customer.
    pub customer_id: UserId,
    /// Payee.
    pub provider_id: ProviderId,
    /// Slots covered.
    pub slot_ids: Vec<SlotId>,
    /// Total in minor units.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Platform fee in minor units.
    pub platform_fee: i64,
    /// Gateway destination account.
    pub destination_account: String,
    /// Reservation hold expiry.
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Builds a `pending` order from its creation input.
    #[must_use]
    pub fn pending(new: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            customer_id: new.customer_id,
            provider_id: new.provider_id,
            slot_ids: new.slot_ids,
            amount: new.amount,
            currency: new.currency,
            platform_fee: new.platform_fee,
            destination_account: new.destination_account,
            checkout_session_id: None,
            payment_intent_id: None,
            receipt_url: None,
            status: OrderStatus::Pending,
            hold_expires_at: new.hold_expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_order_has_no_gateway_handles() {
        let order = Order::pending(NewOrder {
            customer_id: UserId::new(),
            provider_id: ProviderId::new(),
            slot_ids: vec![SlotId::new()],
            amount: 5000,
            currency: "usd".to_string(),
            platform_fee: 500,
            destination_account: "acct_1".to_string(),
            hold_expires_at: None,
        });
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.checkout_session_id.is_none());
        assert!(order.payment_intent_id.is_none());
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!("paid".parse::<OrderStatus>(), Ok(OrderStatus::Paid));
        assert!("settled".parse::<OrderStatus>().is_err());
    }
}
