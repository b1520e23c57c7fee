//! Reservation service: provider calendar edits and customer reservations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    EventBus, MarketEvent, PriceSnapshot, Provider, ProviderId, Service, ServiceId, Slot, SlotId,
    SlotPolicy, UserId,
};
use crate::error::MarketError;
use crate::ledger::{BookingLedger, OrderLedger};
use crate::persistence::{FindResult, Page, Store};

/// One requested reservation in a bulk booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingItem {
    /// Slot to reserve.
    pub slot_id: SlotId,
    /// Catalog service the customer is booking.
    pub service_id: ServiceId,
}

/// Classification of a bulk booking. Every requested id lands in exactly
/// one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingOutcome {
    /// Reserved for the caller.
    pub booked_ids: Vec<SlotId>,
    /// Exists but is taken, past, or lost its race.
    pub unavailable_ids: Vec<SlotId>,
    /// Does not exist, or references an unknown service.
    pub invalid_ids: Vec<SlotId>,
    /// `booked_ids.len()`.
    pub count: usize,
}

/// Orchestrates slot reservations and provider-side structural edits.
///
/// Every state change goes through [`BookingLedger`]; this type adds the
/// ownership, policy and terms preconditions and publishes events after a
/// transition commits.
#[derive(Debug, Clone)]
pub struct ReservationService {
    store: Arc<dyn Store>,
    slots: BookingLedger,
    orders: OrderLedger,
    event_bus: EventBus,
    policy: SlotPolicy,
    terms_version: String,
}

impl ReservationService {
    /// Creates a new `ReservationService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        event_bus: EventBus,
        policy: SlotPolicy,
        terms_version: impl Into<String>,
    ) -> Self {
        Self {
            slots: BookingLedger::new(Arc::clone(&store)),
            orders: OrderLedger::new(Arc::clone(&store)),
            store,
            event_bus,
            policy,
            terms_version: terms_version.into(),
        }
    }

    /// Opens a new `available` slot on the caller's calendar.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the provider does not exist.
    /// - [`MarketError::Forbidden`] if the caller does not own it.
    /// - [`MarketError::BadRequest`] if the interval violates slot policy.
    /// - [`MarketError::Conflict`] if it overlaps another slot.
    pub async fn create_slot(
        &self,
        caller: UserId,
        provider_id: ProviderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, MarketError> {
        self.owned_provider(caller, provider_id).await?;
        let (start, end) = self.policy.validate(start, end, Utc::now())?;
        if self.slots.has_overlap(provider_id, None, start, end).await? {
            return Err(MarketError::Conflict(
                "slot overlaps an existing slot".to_string(),
            ));
        }

        let slot = self.slots.create(Slot::new(provider_id, start, end)).await?;
        let _ = self.event_bus.publish(MarketEvent::SlotCreated {
            provider_id,
            slot_id: slot.id,
            start,
            end,
            timestamp: Utc::now(),
        });
        tracing::info!(slot_id = %slot.id, %provider_id, %start, "slot created");
        Ok(slot)
    }

    /// Lists a provider's slots by start time. With `open_only`, only future
    /// `available` slots are returned.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the provider does not exist.
    pub async fn list_slots(
        &self,
        provider_id: ProviderId,
        open_only: bool,
        page: Page,
    ) -> Result<FindResult<Slot>, MarketError> {
        self.provider(provider_id).await?;
        let open_after = open_only.then(Utc::now);
        self.slots
            .list_for_provider(provider_id, open_after, page)
            .await
    }

    /// Moves an `available` slot to a new interval.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the slot or its provider is missing.
    /// - [`MarketError::Forbidden`] if the caller does not own the provider.
    /// - [`MarketError::BadRequest`] if the new interval violates policy.
    /// - [`MarketError::Conflict`] if it overlaps another slot or the slot
    ///   is no longer available.
    pub async fn update_slot_time(
        &self,
        caller: UserId,
        slot_id: SlotId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, MarketError> {
        let slot = self.slot(slot_id).await?;
        self.owned_provider(caller, slot.provider_id).await?;
        let (start, end) = self.policy.validate(start, end, Utc::now())?;
        if self
            .slots
            .has_overlap(slot.provider_id, Some(slot_id), start, end)
            .await?
        {
            return Err(MarketError::Conflict(
                "slot overlaps an existing slot".to_string(),
            ));
        }

        let Some(moved) = self.slots.try_move(slot_id, start, end).await? else {
            tracing::warn!(%slot_id, "move lost to a reservation");
            return Err(MarketError::already_taken());
        };
        let _ = self.event_bus.publish(MarketEvent::SlotMoved {
            provider_id: moved.provider_id,
            slot_id,
            start,
            end,
            timestamp: Utc::now(),
        });
        tracing::info!(%slot_id, %start, "slot moved");
        Ok(moved)
    }

    /// Deletes an `available` slot.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] if the slot or its provider is missing.
    /// - [`MarketError::Forbidden`] if the caller does not own the provider.
    /// - [`MarketError::Conflict`] if the slot is no longer available.
    pub async fn remove_slot(&self, caller: UserId, slot_id: SlotId) -> Result<(), MarketError> {
        let slot = self.slot(slot_id).await?;
        self.owned_provider(caller, slot.provider_id).await?;

        if !self.slots.try_delete_if_available(slot_id).await? {
            tracing::warn!(%slot_id, "delete lost to a reservation");
            return Err(MarketError::already_taken());
        }
        let _ = self.event_bus.publish(MarketEvent::SlotRemoved {
            provider_id: slot.provider_id,
            slot_id,
            timestamp: Utc::now(),
        });
        tracing::info!(%slot_id, "slot removed");
        Ok(())
    }

    /// Reserves one slot for `customer`.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] if the customer has not accepted the
    ///   current terms.
    /// - [`MarketError::NotFound`] if the slot, service or provider is
    ///   missing.
    /// - [`MarketError::Conflict`] if the slot is taken or in the past.
    pub async fn book_slot(
        &self,
        customer: UserId,
        slot_id: SlotId,
        service_id: ServiceId,
    ) -> Result<Slot, MarketError> {
        self.require_terms(customer).await?;
        let slot = self.slot(slot_id).await?;
        let service = self
            .store
            .service_by_id(service_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("service {service_id} not found")))?;
        let provider = self.provider(slot.provider_id).await?;

        let Some(booked) = self
            .slots
            .try_reserve(
                slot_id,
                customer,
                service_id,
                snapshot(&service, &provider),
                Utc::now(),
            )
            .await?
        else {
            tracing::warn!(%slot_id, %customer, "reservation lost");
            return Err(MarketError::already_taken());
        };

        let _ = self.event_bus.publish(MarketEvent::SlotsBooked {
            provider_id: booked.provider_id,
            customer_id: customer,
            slot_ids: vec![slot_id],
            timestamp: Utc::now(),
        });
        tracing::info!(%slot_id, %customer, "slot booked");
        Ok(booked)
    }

    /// Reserves as many of `items` as possible. Individual lost races are
    /// classified, never raised.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Forbidden`] if the customer has not accepted
    /// the current terms, or [`MarketError::PersistenceError`] if the
    /// advisory reads fail.
    pub async fn book_slots(
        &self,
        customer: UserId,
        items: &[BookingItem],
    ) -> Result<BookingOutcome, MarketError> {
        self.require_terms(customer).await?;

        let mut seen = HashSet::new();
        let items: Vec<BookingItem> = items
            .iter()
            .copied()
            .filter(|item| seen.insert(item.slot_id))
            .collect();
        let ids: Vec<SlotId> = items.iter().map(|item| item.slot_id).collect();

        let now = Utc::now();
        let open: HashMap<SlotId, Slot> = self
            .slots
            .snapshot_available(&ids, now)
            .await?
            .into_iter()
            .map(|slot| (slot.id, slot))
            .collect();

        let missing: Vec<SlotId> = ids
            .iter()
            .copied()
            .filter(|id| !open.contains_key(id))
            .collect();
        let existing: HashSet<SlotId> = if missing.is_empty() {
            HashSet::new()
        } else {
            self.slots
                .get_many(&missing)
                .await?
                .into_iter()
                .map(|slot| slot.id)
                .collect()
        };

        let mut services: HashMap<ServiceId, Option<Service>> = HashMap::new();
        let mut providers: HashMap<ProviderId, Option<Provider>> = HashMap::new();
        let mut outcome = BookingOutcome::default();
        let mut booked_by_provider: HashMap<ProviderId, Vec<SlotId>> = HashMap::new();

        for item in items {
            let Some(slot) = open.get(&item.slot_id) else {
                if existing.contains(&item.slot_id) {
                    outcome.unavailable_ids.push(item.slot_id);
                } else {
                    outcome.invalid_ids.push(item.slot_id);
                }
                continue;
            };

            // Lookup failures are not cached, so a later item may retry.
            let service = match services.get(&item.service_id) {
                Some(cached) => cached.clone(),
                None => match self.store.service_by_id(item.service_id).await {
                    Ok(loaded) => {
                        services.insert(item.service_id, loaded.clone());
                        loaded
                    }
                    Err(e) => {
                        tracing::warn!(slot_id = %item.slot_id, service_id = %item.service_id, error = %e, "bulk service lookup failed");
                        outcome.unavailable_ids.push(item.slot_id);
                        continue;
                    }
                },
            };
            let provider = match providers.get(&slot.provider_id) {
                Some(cached) => cached.clone(),
                None => match self.store.provider_by_id(slot.provider_id).await {
                    Ok(loaded) => {
                        providers.insert(slot.provider_id, loaded.clone());
                        loaded
                    }
                    Err(e) => {
                        tracing::warn!(slot_id = %item.slot_id, provider_id = %slot.provider_id, error = %e, "bulk provider lookup failed");
                        outcome.unavailable_ids.push(item.slot_id);
                        continue;
                    }
                },
            };
            let (Some(service), Some(provider)) = (service, provider) else {
                outcome.invalid_ids.push(item.slot_id);
                continue;
            };

            match self
                .slots
                .try_reserve(
                    item.slot_id,
                    customer,
                    item.service_id,
                    snapshot(&service, &provider),
                    now,
                )
                .await
            {
                Ok(Some(booked)) => {
                    booked_by_provider
                        .entry(booked.provider_id)
                        .or_default()
                        .push(booked.id);
                    outcome.booked_ids.push(booked.id);
                }
                Ok(None) => {
                    tracing::debug!(slot_id = %item.slot_id, %customer, "bulk reservation lost race");
                    outcome.unavailable_ids.push(item.slot_id);
                }
                Err(e) => {
                    tracing::warn!(slot_id = %item.slot_id, error = %e, "bulk reservation failed");
                    outcome.unavailable_ids.push(item.slot_id);
                }
            }
        }

        outcome.count = outcome.booked_ids.len();
        for (provider_id, slot_ids) in booked_by_provider {
            let _ = self.event_bus.publish(MarketEvent::SlotsBooked {
                provider_id,
                customer_id: customer,
                slot_ids,
                timestamp: Utc::now(),
            });
        }
        tracing::info!(
            %customer,
            booked = outcome.count,
            unavailable = outcome.unavailable_ids.len(),
            invalid = outcome.invalid_ids.len(),
            "bulk booking processed"
        );
        Ok(outcome)
    }

    /// Releases a slot the customer holds in `booked`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the slot is missing, or
    /// [`MarketError::Conflict`] if the customer does not hold it or a
    /// pending checkout still covers it.
    pub async fn cancel_reservation(
        &self,
        customer: UserId,
        slot_id: SlotId,
    ) -> Result<(), MarketError> {
        let slot = self.slot(slot_id).await?;
        if self.orders.has_pending_covering(slot_id).await? {
            tracing::warn!(%slot_id, %customer, "cancel refused during checkout");
            return Err(MarketError::Conflict(
                "slot is held by a checkout in progress".to_string(),
            ));
        }
        if !self.slots.try_release(slot_id, customer).await? {
            return Err(MarketError::Conflict(
                "slot is not reserved by you".to_string(),
            ));
        }
        let _ = self.event_bus.publish(MarketEvent::SlotsReleased {
            provider_id: slot.provider_id,
            slot_ids: vec![slot_id],
            timestamp: Utc::now(),
        });
        tracing::info!(%slot_id, %customer, "reservation canceled");
        Ok(())
    }

    async fn require_terms(&self, customer: UserId) -> Result<(), MarketError> {
        let user = self.store.user_by_id(customer).await?;
        let accepted = user.and_then(|u| u.accepted_terms_version);
        if accepted.as_deref() == Some(self.terms_version.as_str()) {
            Ok(())
        } else {
            Err(MarketError::Forbidden(format!(
                "terms of service version {} must be accepted",
                self.terms_version
            )))
        }
    }

    async fn slot(&self, slot_id: SlotId) -> Result<Slot, MarketError> {
        self.slots
            .get(slot_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("slot {slot_id} not found")))
    }

    async fn provider(&self, provider_id: ProviderId) -> Result<Provider, MarketError> {
        self.store
            .provider_by_id(provider_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("provider {provider_id} not found")))
    }

    async fn owned_provider(
        &self,
        caller: UserId,
        provider_id: ProviderId,
    ) -> Result<Provider, MarketError> {
        let provider = self.provider(provider_id).await?;
        if provider.owner_id != caller {
            return Err(MarketError::Forbidden(
                "only the provider's owner may edit its calendar".to_string(),
            ));
        }
        Ok(provider)
    }
}

fn snapshot(service: &Service, provider: &Provider) -> PriceSnapshot {
    PriceSnapshot {
        service_name: service.name.clone(),
        service_slug: service.slug.clone(),
        provider_name: provider.name.clone(),
        provider_slug: provider.slug.clone(),
        hourly_rate: provider.hourly_rate,
    }
}
