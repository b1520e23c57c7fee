//! In-process [`Store`] backed by `RwLock<HashMap<..>>` collections.
//!
//! Each collection sits behind its own [`tokio::sync::RwLock`]. A filtered
//! update evaluates the filter and applies the patch under one write guard,
//! so two racing conditional updates can never both match the same
//! document.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{FindResult, OrderFilter, OrderPatch, Page, SlotFilter, SlotPatch, Store};
use crate::domain::{
    AccountFlags, Order, OrderId, Provider, ProviderId, Service, ServiceId, Slot, SlotId, User,
    UserId,
};
use crate::error::MarketError;

/// Store for development, tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<SlotId, Slot>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    providers: RwLock<HashMap<ProviderId, Provider>>,
    services: RwLock<HashMap<ServiceId, Service>>,
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_slot(&self, slot: Slot) -> Result<Slot, MarketError> {
        let mut map = self.slots.write().await;
        if map.contains_key(&slot.id) {
            return Err(MarketError::PersistenceError(format!(
                "slot {} already exists",
                slot.id
            )));
        }
        map.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn find_slots(
        &self,
        filter: &SlotFilter,
        page: Option<Page>,
    ) -> Result<FindResult<Slot>, MarketError> {
        let map = self.slots.read().await;
        let mut docs: Vec<Slot> = map.values().filter(|s| filter.matches(s)).cloned().collect();
        docs.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        let total = docs.len() as u64;
        if let Some(page) = page {
            let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
            docs = docs
                .into_iter()
                .skip(skip)
                .take(page.per_page as usize)
                .collect();
        }
        Ok(FindResult { docs, total })
    }

    async fn update_slots_where(
        &self,
        filter: &SlotFilter,
        patch: &SlotPatch,
    ) -> Result<Vec<Slot>, MarketError> {
        let now = Utc::now();
        let mut map = self.slots.write().await;
        let mut updated = Vec::new();
        for slot in map.values_mut().filter(|s| filter.matches(s)) {
            patch.apply(slot, now);
            updated.push(slot.clone());
        }
        Ok(updated)
    }

    async fn delete_slots_where(&self, filter: &SlotFilter) -> Result<Vec<Slot>, MarketError> {
        let mut map = self.slots.write().await;
        let doomed: Vec<SlotId> = map
            .values()
            .filter(|s| filter.matches(s))
            .map(|s| s.id)
            .collect();
        Ok(doomed.iter().filter_map(|id| map.remove(id)).collect())
    }

    async fn create_order(&self, order: Order) -> Result<Order, MarketError> {
        let mut map = self.orders.write().await;
        if map.contains_key(&order.id) {
            return Err(MarketError::PersistenceError(format!(
                "order {} already exists",
                order.id
            )));
        }
        map.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, MarketError> {
        let map = self.orders.read().await;
        let mut docs: Vec<Order> = map.values().filter(|o| filter.matches(o)).cloned().collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(docs)
    }

    async fn update_orders_where(
        &self,
        filter: &OrderFilter,
        patch: &OrderPatch,
    ) -> Result<Vec<Order>, MarketError> {
        let now = Utc::now();
        let mut map = self.orders.write().await;
        let mut updated = Vec::new();
        for order in map.values_mut().filter(|o| filter.matches(o)) {
            patch.apply(order, now);
            updated.push(order.clone());
        }
        Ok(updated)
    }

    async fn provider_by_id(&self, id: ProviderId) -> Result<Option<Provider>, MarketError> {
        Ok(self.providers.read().await.get(&id).cloned())
    }

    async fn save_provider(&self, provider: Provider) -> Result<Provider, MarketError> {
        self.providers
            .write()
            .await
            .insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn update_provider_flags(
        &self,
        account_id: &str,
        flags: AccountFlags,
    ) -> Result<Vec<Provider>, MarketError> {
        let mut map = self.providers.write().await;
        let mut updated = Vec::new();
        for provider in map
            .values_mut()
            .filter(|p| p.payment_account_id.as_deref() == Some(account_id))
        {
            provider.charges_enabled = flags.charges_enabled;
            provider.payouts_enabled = flags.payouts_enabled;
            provider.details_submitted = flags.details_submitted;
            updated.push(provider.clone());
        }
        Ok(updated)
    }

    async fn service_by_id(&self, id: ServiceId) -> Result<Option<Service>, MarketError> {
        Ok(self.services.read().await.get(&id).cloned())
    }

    async fn save_service(&self, service: Service) -> Result<Service, MarketError> {
        self.services
            .write()
            .await
            .insert(service.id, service.clone());
        Ok(service)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, MarketError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn user_by_external_id(&self, external_id: &str) -> Result<Option<User>, MarketError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn save_user(&self, user: User) -> Result<User, MarketError> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(user)
    }
}
