//! Payment-webhook reconciler.
//!
//! Drives orders and slots from gateway events. Every handler is a
//! `pending → X` transition guarded in the same conditional update, so a
//! redelivered event lands on an already-advanced order and becomes a no-op.
//!
//! Outcomes that can never become actionable (unknown order, bad metadata,
//! order already settled) are acknowledged as success. Storage failures are
//! returned as errors so the gateway redelivers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{CheckoutMetadata, EventBus, MarketEvent, Order, OrderId, OrderStatus};
use crate::error::MarketError;
use crate::gateway::{AccountObject, ChargeObject, GatewayEvent, SessionObject, WebhookVerifier};
use crate::ledger::{BookingLedger, OrderLedger};
use crate::persistence::Store;

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Order moved to `paid`; `confirmed` slots moved to `confirmed`.
    OrderPaid {
        /// Settled order.
        order_id: OrderId,
        /// Slots confirmed by this delivery.
        confirmed: usize,
    },
    /// Order moved to `canceled`; `released` slots went back to `available`.
    OrderCanceled {
        /// Canceled order.
        order_id: OrderId,
        /// Slots released by this delivery.
        released: usize,
    },
    /// Verification flags mirrored onto `providers` provider records.
    AccountSynced {
        /// Providers updated.
        providers: usize,
    },
    /// Receipt URL stored on `orders` orders.
    ReceiptStored {
        /// Orders updated.
        orders: usize,
    },
    /// The order already left `pending`.
    AlreadyProcessed,
    /// The event references an order that does not exist.
    OrderMissing,
    /// The event's metadata could not be decoded.
    InvalidMetadata,
    /// Event type with no handler.
    Ignored,
}

impl WebhookOutcome {
    /// Short machine-readable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPaid { .. } => "order_paid",
            Self::OrderCanceled { .. } => "order_canceled",
            Self::AccountSynced { .. } => "account_synced",
            Self::ReceiptStored { .. } => "receipt_stored",
            Self::AlreadyProcessed => "already_processed",
            Self::OrderMissing => "order_missing",
            Self::InvalidMetadata => "invalid_metadata",
            Self::Ignored => "ignored",
        }
    }
}

/// Authenticates and applies inbound gateway events.
#[derive(Debug, Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn Store>,
    slots: BookingLedger,
    orders: OrderLedger,
    verifier: WebhookVerifier,
    event_bus: EventBus,
}

impl WebhookReconciler {
    /// Creates a new `WebhookReconciler`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, verifier: WebhookVerifier, event_bus: EventBus) -> Self {
        Self {
            slots: BookingLedger::new(Arc::clone(&store)),
            orders: OrderLedger::new(Arc::clone(&store)),
            store,
            verifier,
            event_bus,
        }
    }

    /// Verifies and applies one delivery.
    ///
    /// # Errors
    ///
    /// - [`MarketError::InvalidSignature`] if the signature is missing or
    ///   does not verify. Nothing is processed.
    /// - [`MarketError::BadRequest`] if the body is not an event.
    /// - [`MarketError::PersistenceError`] on storage failure.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, MarketError> {
        self.handle_at(payload, signature, Utc::now()).await
    }

    /// [`Self::handle`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::handle`].
    pub async fn handle_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, MarketError> {
        let Some(signature) = signature else {
            tracing::warn!("webhook without signature header");
            return Err(MarketError::InvalidSignature(
                "missing signature header".to_string(),
            ));
        };
        if let Err(e) = self.verifier.verify(payload, signature, now) {
            tracing::warn!(error = %e, "webhook signature rejected");
            return Err(e);
        }

        let event = GatewayEvent::from_slice(payload)?;
        let event_type = event.event_type().to_string();
        let outcome = self.apply(event).await?;
        tracing::info!(%event_type, outcome = outcome.as_str(), "webhook processed");
        Ok(outcome)
    }

    /// Applies an already-verified event.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn apply(&self, event: GatewayEvent) -> Result<WebhookOutcome, MarketError> {
        match event {
            GatewayEvent::CheckoutCompleted(session) => self.checkout_completed(&session).await,
            GatewayEvent::CheckoutExpired(session) => self.checkout_expired(&session).await,
            GatewayEvent::AccountUpdated(account) => self.account_updated(&account).await,
            GatewayEvent::ChargeSucceeded(charge) => self.charge_succeeded(&charge).await,
            GatewayEvent::PaymentFailed | GatewayEvent::Other(_) => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn pending_order(
        &self,
        session: &SessionObject,
    ) -> Result<Result<Order, WebhookOutcome>, MarketError> {
        let meta = match CheckoutMetadata::from_map(&session.metadata) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "unusable checkout metadata");
                return Ok(Err(WebhookOutcome::InvalidMetadata));
            }
        };
        let Some(order) = self.orders.get(meta.order_id).await? else {
            tracing::warn!(order_id = %meta.order_id, "webhook for unknown order");
            return Ok(Err(WebhookOutcome::OrderMissing));
        };
        if order.customer_id != meta.customer_id || order.provider_id != meta.provider_id {
            tracing::warn!(order_id = %order.id, "checkout metadata does not match order");
            return Ok(Err(WebhookOutcome::InvalidMetadata));
        }
        if order.status != OrderStatus::Pending {
            tracing::debug!(order_id = %order.id, status = %order.status, "order already settled");
            return Ok(Err(WebhookOutcome::AlreadyProcessed));
        }
        Ok(Ok(order))
    }

    async fn checkout_completed(
        &self,
        session: &SessionObject,
    ) -> Result<WebhookOutcome, MarketError> {
        let order = match self.pending_order(session).await? {
            Ok(order) => order,
            Err(outcome) => return Ok(outcome),
        };

        let confirmed = self
            .slots
            .try_confirm(&order.slot_ids, order.customer_id)
            .await?;
        if confirmed.len() < order.slot_ids.len() {
            tracing::warn!(
                order_id = %order.id,
                expected = order.slot_ids.len(),
                confirmed = confirmed.len(),
                "paid order no longer holds every slot"
            );
        }

        let paid = self
            .orders
            .mark_paid_if_pending(order.id, session.payment_intent.as_deref(), &session.id)
            .await?;
        if !paid {
            tracing::debug!(order_id = %order.id, "order settled concurrently");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let _ = self.event_bus.publish(MarketEvent::OrderPaid {
            provider_id: order.provider_id,
            order_id: order.id,
            slot_ids: confirmed.iter().map(|slot| slot.id).collect(),
            timestamp: Utc::now(),
        });
        tracing::info!(order_id = %order.id, confirmed = confirmed.len(), "order paid");
        Ok(WebhookOutcome::OrderPaid {
            order_id: order.id,
            confirmed: confirmed.len(),
        })
    }

    async fn checkout_expired(
        &self,
        session: &SessionObject,
    ) -> Result<WebhookOutcome, MarketError> {
        let order = match self.pending_order(session).await? {
            Ok(order) => order,
            Err(outcome) => return Ok(outcome),
        };

        // Release before canceling: a crash in between leaves the order
        // pending, so redelivery finishes the job.
        let released = self
            .slots
            .release_many(&order.slot_ids, order.customer_id)
            .await?;
        let canceled = self.orders.mark_canceled_if_pending(order.id).await?;
        if !canceled {
            tracing::debug!(order_id = %order.id, "order settled concurrently");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let _ = self.event_bus.publish(MarketEvent::OrderCanceled {
            provider_id: order.provider_id,
            order_id: order.id,
            timestamp: Utc::now(),
        });
        if !released.is_empty() {
            let _ = self.event_bus.publish(MarketEvent::SlotsReleased {
                provider_id: order.provider_id,
                slot_ids: released.iter().map(|slot| slot.id).collect(),
                timestamp: Utc::now(),
            });
        }
        tracing::info!(order_id = %order.id, released = released.len(), "order canceled");
        Ok(WebhookOutcome::OrderCanceled {
            order_id: order.id,
            released: released.len(),
        })
    }

    async fn account_updated(&self, account: &AccountObject) -> Result<WebhookOutcome, MarketError> {
        let updated = self
            .store
            .update_provider_flags(&account.id, account.flags)
            .await?;
        tracing::info!(
            account_id = %account.id,
            providers = updated.len(),
            charges_enabled = account.flags.charges_enabled,
            "provider account synced"
        );
        Ok(WebhookOutcome::AccountSynced {
            providers: updated.len(),
        })
    }

    async fn charge_succeeded(&self, charge: &ChargeObject) -> Result<WebhookOutcome, MarketError> {
        let (Some(intent), Some(receipt)) = (&charge.payment_intent, &charge.receipt_url) else {
            tracing::debug!(charge_id = %charge.id, "charge without intent or receipt");
            return Ok(WebhookOutcome::Ignored);
        };
        let updated = self.orders.attach_receipt(intent, receipt).await?;
        Ok(WebhookOutcome::ReceiptStored {
            orders: updated.len(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{NewOrder, SlotId, SlotPolicy, SlotStatus};
    use crate::persistence::MemoryStore;
    use crate::service::ReservationService;
    use crate::service::reservation::tests::{Fixture, TERMS, fixture, open_slot};
    use serde_json::json;

    const SECRET: &str = "whsec_reconciler";

    struct Harness {
        fx: Fixture,
        reconciler: WebhookReconciler,
        verifier: WebhookVerifier,
    }

    async fn harness() -> Harness {
        let fx = fixture().await;
        let store: Arc<dyn Store> = Arc::clone(&fx.store) as Arc<dyn Store>;
        let verifier = WebhookVerifier::new(SECRET, 300);
        let reconciler = WebhookReconciler::new(store, verifier.clone(), EventBus::new(16));
        Harness {
            fx,
            reconciler,
            verifier,
        }
    }

    /// Books `n` slots for alice and opens a pending order over them.
    async fn pending_order(h: &Harness, n: i64) -> Order {
        let store: Arc<dyn Store> = Arc::clone(&h.fx.store) as Arc<dyn Store>;
        let reservations =
            ReservationService::new(Arc::clone(&store), EventBus::new(4), SlotPolicy::default(), TERMS);
        let mut slot_ids = Vec::new();
        for hours in 2..2 + n {
            let slot = open_slot(&h.fx.store, h.fx.provider.id, hours).await;
            let Ok(booked) = reservations
                .book_slot(h.fx.alice, slot.id, h.fx.service.id)
                .await
            else {
                panic!("booking failed");
            };
            slot_ids.push(booked.id);
        }
        let Ok(order) = OrderLedger::new(store)
            .create_pending(NewOrder {
                customer_id: h.fx.alice,
                provider_id: h.fx.provider.id,
                slot_ids,
                amount: 5_000,
                currency: "usd".to_string(),
                platform_fee: 500,
                destination_account: "acct_studio".to_string(),
                hold_expires_at: None,
            })
            .await
        else {
            panic!("order creation failed");
        };
        order
    }

    fn session_event(kind: &str, order: &Order) -> Vec<u8> {
        let csv = order
            .slot_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" , ");
        json!({
            "id": "evt_1",
            "type": kind,
            "data": {"object": {
                "id": "cs_test_1",
                "payment_intent": "pi_test_1",
                "metadata": {
                    "orderId": order.id.to_string(),
                    "customerId": order.customer_id.to_string(),
                    "providerId": order.provider_id.to_string(),
                    "slotIdsCsv": format!("{csv},"),
                }
            }}
        })
        .to_string()
        .into_bytes()
    }

    async fn deliver(h: &Harness, body: &[u8]) -> Result<WebhookOutcome, MarketError> {
        let now = Utc::now();
        let Ok(header) = h.verifier.sign(body, now.timestamp()) else {
            panic!("signing failed");
        };
        h.reconciler.handle_at(body, Some(&header), now).await
    }

    async fn slot_status(store: &MemoryStore, id: SlotId) -> SlotStatus {
        let Ok(Some(slot)) = store.slot_by_id(id).await else {
            panic!("slot missing");
        };
        slot.status
    }

    async fn order_status(store: &MemoryStore, id: OrderId) -> OrderStatus {
        let Ok(Some(order)) = store.order_by_id(id).await else {
            panic!("order missing");
        };
        order.status
    }

    #[tokio::test]
    async fn completed_is_idempotent_under_redelivery() {
        let h = harness().await;
        let order = pending_order(&h, 1).await;
        let body = session_event("checkout.session.completed", &order);

        let first = deliver(&h, &body).await;
        assert_eq!(
            first.ok(),
            Some(WebhookOutcome::OrderPaid {
                order_id: order.id,
                confirmed: 1
            })
        );
        let second = deliver(&h, &body).await;
        assert_eq!(second.ok(), Some(WebhookOutcome::AlreadyProcessed));

        assert_eq!(order_status(&h.fx.store, order.id).await, OrderStatus::Paid);
        for id in &order.slot_ids {
            assert_eq!(slot_status(&h.fx.store, *id).await, SlotStatus::Confirmed);
        }
        let Ok(Some(stored)) = h.fx.store.order_by_id(order.id).await else {
            panic!("order missing");
        };
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_test_1"));
        assert_eq!(stored.checkout_session_id.as_deref(), Some("cs_test_1"));
    }

    #[tokio::test]
    async fn concurrent_redelivery_pays_once() {
        let h = Arc::new(harness().await);
        let order = pending_order(&h, 2).await;
        let body = Arc::new(session_event("checkout.session.completed", &order));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let h = Arc::clone(&h);
            let body = Arc::clone(&body);
            handles.push(tokio::spawn(async move { deliver(&h, &body).await }));
        }
        let mut paid = 0;
        let mut confirmed_total = 0;
        for handle in handles {
            let Ok(Ok(outcome)) = handle.await else {
                panic!("delivery failed");
            };
            if let WebhookOutcome::OrderPaid { confirmed, .. } = outcome {
                paid += 1;
                confirmed_total += confirmed;
            }
        }
        assert_eq!(paid, 1);
        assert!(confirmed_total <= 2);
        assert_eq!(order_status(&h.fx.store, order.id).await, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn expired_releases_once() {
        let h = harness().await;
        let order = pending_order(&h, 2).await;
        let body = session_event("checkout.session.expired", &order);

        let first = deliver(&h, &body).await;
        assert_eq!(
            first.ok(),
            Some(WebhookOutcome::OrderCanceled {
                order_id: order.id,
                released: 2
            })
        );
        let second = deliver(&h, &body).await;
        assert_eq!(second.ok(), Some(WebhookOutcome::AlreadyProcessed));

        assert_eq!(order_status(&h.fx.store, order.id).await, OrderStatus::Canceled);
        for id in &order.slot_ids {
            assert_eq!(slot_status(&h.fx.store, *id).await, SlotStatus::Available);
        }
    }

    #[tokio::test]
    async fn expired_after_paid_is_a_no_op() {
        let h = harness().await;
        let order = pending_order(&h, 1).await;
        let _ = deliver(&h, &session_event("checkout.session.completed", &order)).await;
        let late = deliver(&h, &session_event("checkout.session.expired", &order)).await;
        assert_eq!(late.ok(), Some(WebhookOutcome::AlreadyProcessed));
        for id in &order.slot_ids {
            assert_eq!(slot_status(&h.fx.store, *id).await, SlotStatus::Confirmed);
        }
    }

    #[tokio::test]
    async fn bad_signature_processes_nothing() {
        let h = harness().await;
        let order = pending_order(&h, 1).await;
        let body = session_event("checkout.session.completed", &order);
        let forged = WebhookVerifier::new("not-the-secret", 300);
        let Ok(header) = forged.sign(&body, Utc::now().timestamp()) else {
            panic!("signing failed");
        };

        let result = h.reconciler.handle(&body, Some(&header)).await;
        assert!(matches!(result, Err(MarketError::InvalidSignature(_))));
        let unsigned = h.reconciler.handle(&body, None).await;
        assert!(matches!(unsigned, Err(MarketError::InvalidSignature(_))));
        assert_eq!(order_status(&h.fx.store, order.id).await, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn unusable_events_are_acknowledged() {
        let h = harness().await;
        let no_meta = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_x", "metadata": {"orderId": "garbage"}}}
        })
        .to_string();
        assert_eq!(
            deliver(&h, no_meta.as_bytes()).await.ok(),
            Some(WebhookOutcome::InvalidMetadata)
        );

        let mut ghost = pending_order(&h, 1).await;
        ghost.id = OrderId::new();
        let body = session_event("checkout.session.completed", &ghost);
        assert_eq!(deliver(&h, &body).await.ok(), Some(WebhookOutcome::OrderMissing));

        let failed = json!({"type": "payment_intent.payment_failed", "data": {"object": {}}})
            .to_string();
        assert_eq!(
            deliver(&h, failed.as_bytes()).await.ok(),
            Some(WebhookOutcome::Ignored)
        );
        let other = json!({"type": "customer.created", "data": {"object": {}}}).to_string();
        assert_eq!(deliver(&h, other.as_bytes()).await.ok(), Some(WebhookOutcome::Ignored));
    }

    #[tokio::test]
    async fn account_update_mirrors_flags() {
        let h = harness().await;
        let body = json!({
            "type": "account.updated",
            "data": {"object": {
                "id": "acct_studio",
                "charges_enabled": false,
                "payouts_enabled": true,
                "details_submitted": true
            }}
        })
        .to_string();
        assert_eq!(
            deliver(&h, body.as_bytes()).await.ok(),
            Some(WebhookOutcome::AccountSynced { providers: 1 })
        );
        let Ok(Some(provider)) = h.fx.store.provider_by_id(h.fx.provider.id).await else {
            panic!("provider missing");
        };
        assert!(!provider.charges_enabled);
        assert!(provider.payable_account().is_none());
    }

    #[tokio::test]
    async fn charge_receipt_is_mirrored() {
        let h = harness().await;
        let order = pending_order(&h, 1).await;
        let _ = deliver(&h, &session_event("checkout.session.completed", &order)).await;
        let body = json!({
            "type": "charge.succeeded",
            "data": {"object": {
                "id": "ch_1",
                "payment_intent": "pi_test_1",
                "receipt_url": "https://pay.example/receipts/1"
            }}
        })
        .to_string();
        assert_eq!(
            deliver(&h, body.as_bytes()).await.ok(),
            Some(WebhookOutcome::ReceiptStored { orders: 1 })
        );
        let Ok(Some(stored)) = h.fx.store.order_by_id(order.id).await else {
            panic!("order missing");
        };
        assert_eq!(
            stored.receipt_url.as_deref(),
            Some("https://pay.example/receipts/1")
        );
    }
}
