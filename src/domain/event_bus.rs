//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every committed
//! transition publishes a [`MarketEvent`] through the bus, and WebSocket
//! connections subscribe to receive the ones for the providers they watch.

use tokio::sync::broadcast;

use super::MarketEvent;

/// Broadcast bus for [`MarketEvent`]s.
///
/// When the ring buffer is full the oldest events are dropped for lagging
/// receivers. Publishing never blocks a state transition.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: MarketEvent) -> usize {
        tracing::trace!(event_type = event.event_type_str(), "publishing market event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
