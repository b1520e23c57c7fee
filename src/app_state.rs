//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::MarketConfig;
use crate::domain::EventBus;
use crate::gateway::{PaymentGateway, WebhookVerifier};
use crate::identity::{IdentityResolver, StoreIdentityResolver};
use crate::persistence::Store;
use crate::service::{CheckoutService, ReservationService, WebhookReconciler};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Calendars and reservations.
    pub reservations: Arc<ReservationService>,
    /// Orders and payment sessions.
    pub checkout: Arc<CheckoutService>,
    /// Gateway event reconciliation.
    pub webhooks: Arc<WebhookReconciler>,
    /// Bearer-token resolution for [`crate::identity::Caller`].
    pub identity: Arc<dyn IdentityResolver>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires every service over one store and gateway.
    #[must_use]
    pub fn build(
        config: &MarketConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let reservations = ReservationService::new(
            Arc::clone(&store),
            event_bus.clone(),
            config.slot_policy(),
            config.terms_version.clone(),
        );
        let checkout = CheckoutService::new(
            Arc::clone(&store),
            gateway,
            event_bus.clone(),
            config.checkout_policy(),
        );
        let webhooks = WebhookReconciler::new(
            Arc::clone(&store),
            WebhookVerifier::new(config.webhook_secret.clone(), config.webhook_tolerance_secs),
            event_bus.clone(),
        );
        Self {
            reservations: Arc::new(reservations),
            checkout: Arc::new(checkout),
            webhooks: Arc::new(webhooks),
            identity: Arc::new(StoreIdentityResolver::new(store)),
            event_bus,
        }
    }
}
