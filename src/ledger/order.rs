//! Order ledger: order lifecycle as conditional updates.
//!
//! `mark_*_if_pending` is the idempotency gate for webhook redelivery: the
//! status check and the write happen in the same filtered update.

use std::sync::Arc;

use crate::domain::{NewOrder, Order, OrderId, OrderStatus, SlotId};
use crate::error::MarketError;
use crate::persistence::{OrderFilter, OrderPatch, Store};

/// Conditional-update access to orders.
#[derive(Debug, Clone)]
pub struct OrderLedger {
    store: Arc<dyn Store>,
}

impl OrderLedger {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persists a new `pending` order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn create_pending(&self, new: NewOrder) -> Result<Order, MarketError> {
        self.store.create_order(Order::pending(new)).await
    }

    /// Loads one order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, MarketError> {
        self.store.order_by_id(id).await
    }

    /// Loads the order bound to a gateway checkout session.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn by_session(&self, session_id: &str) -> Result<Option<Order>, MarketError> {
        let found = self.store.find_orders(&OrderFilter::session(session_id)).await?;
        Ok(found.into_iter().next())
    }

    /// Returns `true` if a `pending` order still covers `slot_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn has_pending_covering(&self, slot_id: SlotId) -> Result<bool, MarketError> {
        let filter = OrderFilter::covering(slot_id).with_status(OrderStatus::Pending);
        Ok(!self.store.find_orders(&filter).await?.is_empty())
    }

    /// Records the gateway session id on an order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the order does not exist, or
    /// [`MarketError::PersistenceError`] on storage failure.
    pub async fn attach_external_session(
        &self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<Order, MarketError> {
        let patch = OrderPatch {
            checkout_session_id: Some(session_id.to_string()),
            ..OrderPatch::default()
        };
        self.store
            .update_orders_where(&OrderFilter::id(order_id), &patch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::NotFound(format!("order {order_id} not found")))
    }

    /// `pending → paid`. Returns `false` when the order already left
    /// `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn mark_paid_if_pending(
        &self,
        order_id: OrderId,
        payment_intent_id: Option<&str>,
        session_id: &str,
    ) -> Result<bool, MarketError> {
        let patch = OrderPatch {
            status: Some(OrderStatus::Paid),
            checkout_session_id: Some(session_id.to_string()),
            payment_intent_id: payment_intent_id.map(str::to_string),
            ..OrderPatch::default()
        };
        self.transition_from_pending(order_id, &patch).await
    }

    /// `pending → canceled`. Returns `false` when the order already left
    /// `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn mark_canceled_if_pending(&self, order_id: OrderId) -> Result<bool, MarketError> {
        let patch = OrderPatch {
            status: Some(OrderStatus::Canceled),
            ..OrderPatch::default()
        };
        self.transition_from_pending(order_id, &patch).await
    }

    /// Stores the receipt URL on every order paid through `payment_intent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn attach_receipt(
        &self,
        payment_intent_id: &str,
        receipt_url: &str,
    ) -> Result<Vec<Order>, MarketError> {
        let patch = OrderPatch {
            receipt_url: Some(receipt_url.to_string()),
            ..OrderPatch::default()
        };
        self.store
            .update_orders_where(&OrderFilter::payment_intent(payment_intent_id), &patch)
            .await
    }

    async fn transition_from_pending(
        &self,
        order_id: OrderId,
        patch: &OrderPatch,
    ) -> Result<bool, MarketError> {
        let filter = OrderFilter::id(order_id).with_status(OrderStatus::Pending);
        let updated = self.store.update_orders_where(&filter, patch).await?;
        Ok(!updated.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ProviderId, SlotId, UserId};
    use crate::persistence::MemoryStore;

    async fn pending_order() -> (OrderLedger, Order) {
        let ledger = OrderLedger::new(Arc::new(MemoryStore::new()));
        let Ok(order) = ledger
            .create_pending(NewOrder {
                customer_id: UserId::new(),
                provider_id: ProviderId::new(),
                slot_ids: vec![SlotId::new()],
                amount: 5_000,
                currency: "usd".to_string(),
                platform_fee: 500,
                destination_account: "acct_1".to_string(),
                hold_expires_at: None,
            })
            .await
        else {
            panic!("order creation failed");
        };
        (ledger, order)
    }

    #[tokio::test]
    async fn pending_cover_ends_with_settlement() {
        let (ledger, order) = pending_order().await;
        let Some(slot_id) = order.slot_ids.first().copied() else {
            panic!("order has no slots");
        };
        assert!(matches!(ledger.has_pending_covering(slot_id).await, Ok(true)));
        assert!(matches!(ledger.has_pending_covering(SlotId::new()).await, Ok(false)));

        let _ = ledger.mark_canceled_if_pending(order.id).await;
        assert!(matches!(ledger.has_pending_covering(slot_id).await, Ok(false)));
    }

    #[tokio::test]
    async fn paid_transition_happens_once() {
        let (ledger, order) = pending_order().await;
        let first = ledger
            .mark_paid_if_pending(order.id, Some("pi_1"), "cs_1")
            .await;
        let second = ledger
            .mark_paid_if_pending(order.id, Some("pi_2"), "cs_1")
            .await;
        assert!(matches!(first, Ok(true)));
        assert!(matches!(second, Ok(false)));

        let Ok(Some(stored)) = ledger.get(order.id).await else {
            panic!("order missing");
        };
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn paid_order_cannot_be_canceled() {
        let (ledger, order) = pending_order().await;
        let _ = ledger.mark_paid_if_pending(order.id, None, "cs_1").await;
        assert!(matches!(ledger.mark_canceled_if_pending(order.id).await, Ok(false)));
    }

    #[tokio::test]
    async fn session_lookup_after_attach() {
        let (ledger, order) = pending_order().await;
        assert!(ledger.attach_external_session(order.id, "cs_42").await.is_ok());
        let Ok(Some(found)) = ledger.by_session("cs_42").await else {
            panic!("session lookup failed");
        };
        assert_eq!(found.id, order.id);
        assert!(matches!(ledger.by_session("cs_other").await, Ok(None)));
    }

    #[tokio::test]
    async fn attach_to_missing_order_is_not_found() {
        let (ledger, _) = pending_order().await;
        let result = ledger.attach_external_session(OrderId::new(), "cs_x").await;
        assert!(matches!(result, Err(MarketError::NotFound(_))));
    }

    #[tokio::test]
    async fn receipt_is_matched_by_payment_intent() {
        let (ledger, order) = pending_order().await;
        let _ = ledger.mark_paid_if_pending(order.id, Some("pi_9"), "cs_9").await;
        let Ok(updated) = ledger.attach_receipt("pi_9", "https://pay/r/1").await else {
            panic!("receipt update failed");
        };
        assert_eq!(updated.len(), 1);
        let Ok(none) = ledger.attach_receipt("pi_missing", "https://pay/r/2").await else {
            panic!("receipt update failed");
        };
        assert!(none.is_empty());
    }
}
