//! Persistence boundary.
//!
//! [`Store`] is the document-store contract the booking core runs on:
//! `find`, `create`, and above all `update_*_where`, a filtered update that
//! returns the documents it matched and changed. An empty result *is* the
//! conditional-update signal; every racing transition in the crate goes
//! through it.
//!
//! Two backends are provided: [`memory::MemoryStore`] and
//! [`postgres::PostgresStore`].

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AccountFlags, Order, OrderId, OrderStatus, PriceSnapshot, Provider, ProviderId, Service,
    ServiceId, Slot, SlotId, SlotStatus, User, UserId,
};
use crate::error::MarketError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Predicate over slots. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFilter {
    /// Slot id must be one of these.
    pub ids: Option<Vec<SlotId>>,
    /// Slot id must not be this one.
    pub exclude_id: Option<SlotId>,
    /// Owning provider.
    pub provider_id: Option<ProviderId>,
    /// Current status.
    pub status: Option<SlotStatus>,
    /// Current customer.
    pub customer_id: Option<UserId>,
    /// `start > t`.
    pub starts_after: Option<DateTime<Utc>>,
    /// `start < .1 AND end > .0`.
    pub overlapping: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl SlotFilter {
    /// Matches exactly one slot id.
    #[must_use]
    pub fn id(id: SlotId) -> Self {
        Self::ids(vec![id])
    }

    /// Matches any of the given ids.
    #[must_use]
    pub fn ids(ids: Vec<SlotId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    /// Matches every slot of a provider.
    #[must_use]
    pub fn provider(provider_id: ProviderId) -> Self {
        Self {
            provider_id: Some(provider_id),
            ..Self::default()
        }
    }

    /// Restricts to a status.
    #[must_use]
    pub fn with_status(mut self, status: SlotStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to a customer.
    #[must_use]
    pub fn with_customer(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Restricts to slots starting strictly after `t`.
    #[must_use]
    pub fn starting_after(mut self, t: DateTime<Utc>) -> Self {
        self.starts_after = Some(t);
        self
    }

    /// Restricts to slots intersecting `[start, end)`.
    #[must_use]
    pub fn overlapping(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.overlapping = Some((start, end));
        self
    }

    /// Excludes one slot id.
    #[must_use]
    pub fn excluding(mut self, id: SlotId) -> Self {
        self.exclude_id = Some(id);
        self
    }

    /// Evaluates the predicate against a slot.
    #[must_use]
    pub fn matches(&self, slot: &Slot) -> bool {
        self.ids.as_ref().is_none_or(|ids| ids.contains(&slot.id))
            && self.exclude_id != Some(slot.id)
            && self.provider_id.is_none_or(|p| p == slot.provider_id)
            && self.status.is_none_or(|s| s == slot.status)
            && self.customer_id.is_none_or(|c| slot.customer_id == Some(c))
            && self.starts_after.is_none_or(|t| slot.start > t)
            && self
                .overlapping
                .is_none_or(|(start, end)| slot.start < end && slot.end > start)
    }
}

/// Field assignments applied by a filtered slot update.
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPatch {
    /// New status.
    pub status: Option<SlotStatus>,
    /// New customer.
    pub customer_id: Option<Option<UserId>>,
    /// New service assignment.
    pub service_id: Option<Option<ServiceId>>,
    /// New price snapshot.
    pub price_snapshot: Option<Option<PriceSnapshot>>,
    /// New start.
    pub start: Option<DateTime<Utc>>,
    /// New end.
    pub end: Option<DateTime<Utc>>,
}

impl SlotPatch {
    /// Applies the patch in place, stamping `updated_at`.
    pub fn apply(&self, slot: &mut Slot, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            slot.status = status;
        }
        if let Some(customer_id) = self.customer_id {
            slot.customer_id = customer_id;
        }
        if let Some(service_id) = self.service_id {
            slot.service_id = service_id;
        }
        if let Some(snapshot) = &self.price_snapshot {
            slot.price_snapshot.clone_from(snapshot);
        }
        if let Some(start) = self.start {
            slot.start = start;
        }
        if let Some(end) = self.end {
            slot.end = end;
        }
        slot.updated_at = now;
    }
}

/// Predicate over orders. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Order id.
    pub id: Option<OrderId>,
    /// Current status.
    pub status: Option<OrderStatus>,
    /// Gateway checkout session id.
    pub checkout_session_id: Option<String>,
    /// Gateway payment intent id.
    pub payment_intent_id: Option<String>,
    /// Orders whose cart contains this slot.
    pub covers_slot: Option<SlotId>,
}

impl OrderFilter {
    /// Matches one order id.
    #[must_use]
    pub fn id(id: OrderId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Matches the order bound to a checkout session.
    #[must_use]
    pub fn session(session_id: &str) -> Self {
        Self {
            checkout_session_id: Some(session_id.to_string()),
            ..Self::default()
        }
    }

    /// Matches orders paid through a payment intent.
    #[must_use]
    pub fn payment_intent(payment_intent_id: &str) -> Self {
        Self {
            payment_intent_id: Some(payment_intent_id.to_string()),
            ..Self::default()
        }
    }

    /// Matches orders whose cart contains `slot_id`.
    #[must_use]
    pub fn covering(slot_id: SlotId) -> Self {
        Self {
            covers_slot: Some(slot_id),
            ..Self::default()
        }
    }

    /// Restricts to a status.
    #[must_use]
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Evaluates the predicate against an order.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.id.is_none_or(|id| id == order.id)
            && self.status.is_none_or(|s| s == order.status)
            && self
                .checkout_session_id
                .as_deref()
                .is_none_or(|s| order.checkout_session_id.as_deref() == Some(s))
            && self
                .payment_intent_id
                .as_deref()
                .is_none_or(|p| order.payment_intent_id.as_deref() == Some(p))
            && self
                .covers_slot
                .is_none_or(|slot_id| order.slot_ids.contains(&slot_id))
    }
}

/// Field assignments applied by a filtered order update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    /// New status.
    pub status: Option<OrderStatus>,
    /// Gateway checkout session id.
    pub checkout_session_id: Option<String>,
    /// Gateway payment intent id.
    pub payment_intent_id: Option<String>,
    /// Receipt URL.
    pub receipt_url: Option<String>,
}

impl OrderPatch {
    /// Applies the patch in place, stamping `updated_at`.
    pub fn apply(&self, order: &mut Order, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(session) = &self.checkout_session_id {
            order.checkout_session_id = Some(session.clone());
        }
        if let Some(intent) = &self.payment_intent_id {
            order.payment_intent_id = Some(intent.clone());
        }
        if let Some(receipt) = &self.receipt_url {
            order.receipt_url = Some(receipt.clone());
        }
        order.updated_at = now;
    }
}

/// Page selector for `find` calls (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl Page {
    /// Number of items to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

/// Result of a `find` call.
#[derive(Debug, Clone)]
pub struct FindResult<T> {
    /// Matching documents for the requested page.
    pub docs: Vec<T>,
    /// Total number of matching documents across all pages.
    pub total: u64,
}

/// Document store consumed by the ledgers and services.
///
/// Every `update_*_where` must evaluate its filter and apply its patch as one
/// atomic step per document, returning only the documents that matched.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Inserts a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn create_slot(&self, slot: Slot) -> Result<Slot, MarketError>;

    /// Finds slots ordered by start time, optionally paginated.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn find_slots(
        &self,
        filter: &SlotFilter,
        page: Option<Page>,
    ) -> Result<FindResult<Slot>, MarketError>;

    /// Conditionally updates slots, returning the ones that matched.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn update_slots_where(
        &self,
        filter: &SlotFilter,
        patch: &SlotPatch,
    ) -> Result<Vec<Slot>, MarketError>;

    /// Conditionally deletes slots, returning the ones that matched.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn delete_slots_where(&self, filter: &SlotFilter) -> Result<Vec<Slot>, MarketError>;

    /// Inserts a new order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn create_order(&self, order: Order) -> Result<Order, MarketError>;

    /// Finds orders matching a filter.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, MarketError>;

    /// Conditionally updates orders, returning the ones that matched.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn update_orders_where(
        &self,
        filter: &OrderFilter,
        patch: &OrderPatch,
    ) -> Result<Vec<Order>, MarketError>;

    /// Loads a provider.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn provider_by_id(&self, id: ProviderId) -> Result<Option<Provider>, MarketError>;

    /// Inserts or fully replaces a provider.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn save_provider(&self, provider: Provider) -> Result<Provider, MarketError>;

    /// Overwrites the gateway verification flags of every provider linked to
    /// `account_id`, returning the updated providers.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn update_provider_flags(
        &self,
        account_id: &str,
        flags: AccountFlags,
    ) -> Result<Vec<Provider>, MarketError>;

    /// Loads a catalog service.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn service_by_id(&self, id: ServiceId) -> Result<Option<Service>, MarketError>;

    /// Inserts or fully replaces a catalog service.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn save_service(&self, service: Service) -> Result<Service, MarketError>;

    /// Loads a user by internal id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, MarketError>;

    /// Loads a user by external identity subject.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn user_by_external_id(&self, external_id: &str) -> Result<Option<User>, MarketError>;

    /// Inserts or fully replaces a user.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn save_user(&self, user: User) -> Result<User, MarketError>;

    /// Loads one slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn slot_by_id(&self, id: SlotId) -> Result<Option<Slot>, MarketError> {
        let found = self.find_slots(&SlotFilter::id(id), None).await?;
        Ok(found.docs.into_iter().next())
    }

    /// Loads one order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, MarketError> {
        let found = self.find_orders(&OrderFilter::id(id)).await?;
        Ok(found.into_iter().next())
    }
}
