//! Booking ledger: slot state transitions as single conditional updates.
//!
//! Every `try_*` call is one filtered update against the [`Store`]. A lost
//! race or an already-advanced slot shows up as `None`/`false`/empty, never
//! as an error; errors are reserved for storage failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{PriceSnapshot, ProviderId, ServiceId, Slot, SlotId, SlotStatus, UserId};
use crate::error::MarketError;
use crate::persistence::{FindResult, Page, SlotFilter, SlotPatch, Store};

/// Conditional-update access to slots.
#[derive(Debug, Clone)]
pub struct BookingLedger {
    store: Arc<dyn Store>,
}

impl BookingLedger {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads one slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn get(&self, id: SlotId) -> Result<Option<Slot>, MarketError> {
        self.store.slot_by_id(id).await
    }

    /// Loads every slot in `ids` that exists.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn get_many(&self, ids: &[SlotId]) -> Result<Vec<Slot>, MarketError> {
        Ok(self
            .store
            .find_slots(&SlotFilter::ids(ids.to_vec()), None)
            .await?
            .docs)
    }

    /// Advisory read of the subset of `ids` that is available and in the
    /// future. Locks nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn snapshot_available(
        &self,
        ids: &[SlotId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, MarketError> {
        let filter = SlotFilter::ids(ids.to_vec())
            .with_status(SlotStatus::Available)
            .starting_after(now);
        Ok(self.store.find_slots(&filter, None).await?.docs)
    }

    /// Lists a provider's calendar, optionally only future available slots.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn list_for_provider(
        &self,
        provider_id: ProviderId,
        open_after: Option<DateTime<Utc>>,
        page: Page,
    ) -> Result<FindResult<Slot>, MarketError> {
        let mut filter = SlotFilter::provider(provider_id);
        if let Some(now) = open_after {
            filter = filter
                .with_status(SlotStatus::Available)
                .starting_after(now);
        }
        self.store.find_slots(&filter, Some(page)).await
    }

    /// Returns `true` if another slot of the provider intersects
    /// `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn has_overlap(
        &self,
        provider_id: ProviderId,
        exclude: Option<SlotId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, MarketError> {
        let mut filter = SlotFilter::provider(provider_id).overlapping(start, end);
        if let Some(id) = exclude {
            filter = filter.excluding(id);
        }
        let found = self
            .store
            .find_slots(&filter, Some(Page { page: 1, per_page: 1 }))
            .await?;
        Ok(found.total > 0)
    }

    /// Inserts a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn create(&self, slot: Slot) -> Result<Slot, MarketError> {
        self.store.create_slot(slot).await
    }

    /// `available → booked` for `customer_id`, only if the slot is still
    /// available and starts after `now`. Returns the updated slot, or `None`
    /// if someone else got there first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn try_reserve(
        &self,
        slot_id: SlotId,
        customer_id: UserId,
        service_id: ServiceId,
        snapshot: PriceSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, MarketError> {
        let filter = SlotFilter::id(slot_id)
            .with_status(SlotStatus::Available)
            .starting_after(now);
        let patch = SlotPatch {
            status: Some(SlotStatus::Booked),
            customer_id: Some(Some(customer_id)),
            service_id: Some(Some(service_id)),
            price_snapshot: Some(Some(snapshot)),
            ..SlotPatch::default()
        };
        let updated = self.store.update_slots_where(&filter, &patch).await?;
        Ok(updated.into_iter().next())
    }

    /// `booked → available` for one slot, only if `expected_customer` holds
    /// it. Returns whether the release happened.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn try_release(
        &self,
        slot_id: SlotId,
        expected_customer: UserId,
    ) -> Result<bool, MarketError> {
        Ok(!self
            .release_many(&[slot_id], expected_customer)
            .await?
            .is_empty())
    }

    /// `booked → available` for every slot in `ids` still booked by
    /// `customer_id`. Returns the released slots.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn release_many(
        &self,
        ids: &[SlotId],
        customer_id: UserId,
    ) -> Result<Vec<Slot>, MarketError> {
        let filter = SlotFilter::ids(ids.to_vec())
            .with_status(SlotStatus::Booked)
            .with_customer(customer_id);
        let patch = SlotPatch {
            status: Some(SlotStatus::Available),
            customer_id: Some(None),
            service_id: Some(None),
            price_snapshot: Some(None),
            ..SlotPatch::default()
        };
        self.store.update_slots_where(&filter, &patch).await
    }

    /// `booked → confirmed` for every slot in `ids` still booked by
    /// `customer_id`. Returns the confirmed slots.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn try_confirm(
        &self,
        ids: &[SlotId],
        customer_id: UserId,
    ) -> Result<Vec<Slot>, MarketError> {
        let filter = SlotFilter::ids(ids.to_vec())
            .with_status(SlotStatus::Booked)
            .with_customer(customer_id);
        let patch = SlotPatch {
            status: Some(SlotStatus::Confirmed),
            ..SlotPatch::default()
        };
        self.store.update_slots_where(&filter, &patch).await
    }

    /// Deletes the slot only while it is still available.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn try_delete_if_available(&self, slot_id: SlotId) -> Result<bool, MarketError> {
        let filter = SlotFilter::id(slot_id).with_status(SlotStatus::Available);
        Ok(!self.store.delete_slots_where(&filter).await?.is_empty())
    }

    /// Moves the slot only while it is still available.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] on storage failure.
    pub async fn try_move(
        &self,
        slot_id: SlotId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Slot>, MarketError> {
        let filter = SlotFilter::id(slot_id).with_status(SlotStatus::Available);
        let patch = SlotPatch {
            start: Some(start),
            end: Some(end),
            ..SlotPatch::default()
        };
        let updated = self.store.update_slots_where(&filter, &patch).await?;
        Ok(updated.into_iter().next())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use chrono::Duration;

    fn snapshot() -> PriceSnapshot {
        PriceSnapshot {
            service_name: "Tuning".to_string(),
            service_slug: "tuning".to_string(),
            provider_name: "Studio".to_string(),
            provider_slug: "studio".to_string(),
            hourly_rate: 4000,
        }
    }

    async fn ledger_with_slot(hours: i64) -> (BookingLedger, Slot) {
        let ledger = BookingLedger::new(Arc::new(MemoryStore::new()));
        let start = Utc::now() + Duration::hours(hours);
        let Ok(slot) = ledger
            .create(Slot::new(ProviderId::new(), start, start + Duration::hours(1)))
            .await
        else {
            panic!("slot creation failed");
        };
        (ledger, slot)
    }

    #[tokio::test]
    async fn exactly_one_concurrent_reservation_wins() {
        let (ledger, slot) = ledger_with_slot(2).await;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let customer = UserId::new();
                let won = ledger
                    .try_reserve(slot.id, customer, ServiceId::new(), snapshot(), Utc::now())
                    .await;
                (customer, won)
            }));
        }

        let mut winners = Vec::new();
        let mut losers = 0;
        for handle in handles {
            let Ok((customer, result)) = handle.await else {
                panic!("task panicked");
            };
            match result {
                Ok(Some(_)) => winners.push(customer),
                Ok(None) => losers += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(losers, 15);

        let Ok(Some(stored)) = ledger.get(slot.id).await else {
            panic!("slot missing");
        };
        assert_eq!(stored.status, SlotStatus::Booked);
        assert_eq!(stored.customer_id, winners.first().copied());
    }

    #[tokio::test]
    async fn past_slot_cannot_be_reserved() {
        let (ledger, slot) = ledger_with_slot(-3).await;
        let Ok(result) = ledger
            .try_reserve(slot.id, UserId::new(), ServiceId::new(), snapshot(), Utc::now())
            .await
        else {
            panic!("storage failure");
        };
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn release_requires_matching_customer() {
        let (ledger, slot) = ledger_with_slot(2).await;
        let owner = UserId::new();
        let _ = ledger
            .try_reserve(slot.id, owner, ServiceId::new(), snapshot(), Utc::now())
            .await;

        assert!(matches!(ledger.try_release(slot.id, UserId::new()).await, Ok(false)));
        assert!(matches!(ledger.try_release(slot.id, owner).await, Ok(true)));

        let Ok(Some(stored)) = ledger.get(slot.id).await else {
            panic!("slot missing");
        };
        assert_eq!(stored.status, SlotStatus::Available);
        assert!(stored.customer_id.is_none());
        assert!(stored.price_snapshot.is_none());
    }

    #[tokio::test]
    async fn confirm_is_a_one_shot_transition() {
        let (ledger, slot) = ledger_with_slot(2).await;
        let customer = UserId::new();
        let _ = ledger
            .try_reserve(slot.id, customer, ServiceId::new(), snapshot(), Utc::now())
            .await;

        let Ok(first) = ledger.try_confirm(&[slot.id], customer).await else {
            panic!("confirm failed");
        };
        let Ok(second) = ledger.try_confirm(&[slot.id], customer).await else {
            panic!("confirm failed");
        };
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn structural_edits_lose_to_reservation() {
        let (ledger, slot) = ledger_with_slot(2).await;
        let _ = ledger
            .try_reserve(slot.id, UserId::new(), ServiceId::new(), snapshot(), Utc::now())
            .await;

        assert!(matches!(ledger.try_delete_if_available(slot.id).await, Ok(false)));
        let moved = ledger
            .try_move(slot.id, slot.start + Duration::hours(3), slot.end + Duration::hours(3))
            .await;
        assert!(matches!(moved, Ok(None)));
    }

    #[tokio::test]
    async fn overlap_detection_excludes_self() {
        let (ledger, slot) = ledger_with_slot(2).await;
        let Ok(overlaps) = ledger
            .has_overlap(slot.provider_id, Some(slot.id), slot.start, slot.end)
            .await
        else {
            panic!("overlap query failed");
        };
        assert!(!overlaps);
        let Ok(overlaps) = ledger
            .has_overlap(slot.provider_id, None, slot.start, slot.end)
            .await
        else {
            panic!("overlap query failed");
        };
        assert!(overlaps);
    }
}
