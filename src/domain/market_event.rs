//! Domain events reflecting slot and order state transitions.
//!
//! Every successful transition emits a [`MarketEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{OrderId, ProviderId, SlotId, UserId};

/// Domain event emitted after a state transition has been committed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MarketEvent {
    /// A provider opened a new slot.
    SlotCreated {
        /// Owning provider.
        provider_id: ProviderId,
        /// New slot.
        slot_id: SlotId,
        /// Slot start.
        start: DateTime<Utc>,
        /// Slot end.
        end: DateTime<Utc>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A provider moved an available slot.
    SlotMoved {
        /// Owning provider.
        provider_id: ProviderId,
        /// Moved slot.
        slot_id: SlotId,
        /// New start.
        start: DateTime<Utc>,
        /// New end.
        end: DateTime<Utc>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A provider deleted an available slot.
    SlotRemoved {
        /// Owning provider.
        provider_id: ProviderId,
        /// Removed slot.
        slot_id: SlotId,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A customer reserved slots.
    SlotsBooked {
        /// Owning provider.
        provider_id: ProviderId,
        /// Reserving customer.
        customer_id: UserId,
        /// Slots now `booked`.
        slot_ids: Vec<SlotId>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Slots returned to `available`.
    SlotsReleased {
        /// Owning provider.
        provider_id: ProviderId,
        /// Slots now `available`.
        slot_ids: Vec<SlotId>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A pending order was opened for checkout.
    OrderCreated {
        /// Payee.
        provider_id: ProviderId,
        /// New order.
        order_id: OrderId,
        /// Amount in minor units.
        amount: i64,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Payment completed: order paid, slots confirmed.
    OrderPaid {
        /// Payee.
        provider_id: ProviderId,
        /// Paid order.
        order_id: OrderId,
        /// Slots now `confirmed`.
        slot_ids: Vec<SlotId>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Checkout expired: order canceled.
    OrderCanceled {
        /// Payee.
        provider_id: ProviderId,
        /// Canceled order.
        order_id: OrderId,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl MarketEvent {
    /// Returns the provider whose calendar this event concerns.
    #[must_use]
    pub fn provider_id(&self) -> ProviderId {
        match self {
            Self::SlotCreated { provider_id, .. }
            | Self::SlotMoved { provider_id, .. }
            | Self::SlotRemoved { provider_id, .. }
            | Self::SlotsBooked { provider_id, .. }
            | Self::SlotsReleased { provider_id, .. }
            | Self::OrderCreated { provider_id, .. }
            | Self::OrderPaid { provider_id, .. }
            | Self::OrderCanceled { provider_id, .. } => *provider_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SlotCreated { .. } => "slot_created",
            Self::SlotMoved { .. } => "slot_moved",
            Self::SlotRemoved { .. } => "slot_removed",
            Self::SlotsBooked { .. } => "slots_booked",
            Self::SlotsReleased { .. } => "slots_released",
            Self::OrderCreated { .. } => "order_created",
            Self::OrderPaid { .. } => "order_paid",
            Self::OrderCanceled { .. } => "order_canceled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = MarketEvent::SlotsBooked {
            provider_id: ProviderId::new(),
            customer_id: UserId::new(),
            slot_ids: vec![SlotId::new()],
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"slots_booked\""));
        assert_eq!(event.event_type_str(), "slots_booked");
    }

    #[test]
    fn provider_id_accessor() {
        let provider_id = ProviderId::new();
        let event = MarketEvent::OrderCanceled {
            provider_id,
            order_id: OrderId::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.provider_id(), provider_id);
    }
}
