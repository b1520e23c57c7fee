//! Per-connection subscription manager.
//!
//! Tracks which provider calendars a WebSocket client follows and
//! provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::ProviderId;

/// Manages the set of provider subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Followed providers. Ignored while `subscribe_all` is set.
    provider_ids: HashSet<ProviderId>,
    /// Whether the client follows every provider (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds provider IDs to the subscription set.
    pub fn subscribe(&mut self, ids: &[ProviderId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.provider_ids.extend(ids.iter().copied());
    }

    /// Removes provider IDs. `wildcard` clears the follow-all flag.
    pub fn unsubscribe(&mut self, ids: &[ProviderId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.provider_ids.remove(id);
        }
    }

    /// Returns `true` if events of `provider_id` should be forwarded.
    #[must_use]
    pub fn matches(&self, provider_id: ProviderId) -> bool {
        self.subscribe_all || self.provider_ids.contains(&provider_id)
    }

    /// Returns the number of explicitly followed providers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.provider_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
