//! Slot: the bookable unit owned by a provider.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ProviderId, ServiceId, SlotId, UserId};

/// Reservation state of a [`Slot`].
///
/// `Available` slots never carry a customer; `Booked` and `Confirmed` slots
/// always do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Open for reservation.
    Available,
    /// Reserved by a customer, payment outstanding.
    Booked,
    /// Paid for.
    Confirmed,
}

impl SlotStatus {
    /// Returns the storage/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "booked" => Ok(Self::Booked),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(format!("unknown slot status: {other}")),
        }
    }
}

/// Pricing data copied onto a slot at reservation time.
///
/// Later changes to the provider's live rate or names never touch a
/// snapshot that is already attached to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceSnapshot {
    /// Name of the assigned service.
    pub service_name: String,
    /// Slug of the assigned service.
    pub service_slug: String,
    /// Provider display name.
    pub provider_name: String,
    /// Provider slug.
    pub provider_slug: String,
    /// Hourly rate in minor currency units at the time of booking.
    pub hourly_rate: i64,
}

/// A single bookable interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Slot {
    /// Slot identifier.
    pub id: SlotId,
    /// Owning provider.
    pub provider_id: ProviderId,
    /// Inclusive start instant.
    pub start: DateTime<Utc>,
    /// Exclusive end instant.
    pub end: DateTime<Utc>,
    /// Reservation state.
    pub status: SlotStatus,
    /// Reserving customer, set iff status is not `Available`.
    pub customer_id: Option<UserId>,
    /// Service the customer assigned to this reservation.
    pub service_id: Option<ServiceId>,
    /// Price data locked in at booking time.
    pub price_snapshot: Option<PriceSnapshot>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// Creates a new `available` slot for the given provider.
    #[must_use]
    pub fn new(provider_id: ProviderId, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: SlotId::new(),
            provider_id,
            start,
            end,
            status: SlotStatus::Available,
            customer_id: None,
            service_id: None,
            price_snapshot: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Length of the slot in whole minutes.
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Returns `true` when the status/customer pairing is consistent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self.status {
            SlotStatus::Available => self.customer_id.is_none(),
            SlotStatus::Booked | SlotStatus::Confirmed => self.customer_id.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_slot_is_available_without_customer() {
        let start = Utc::now() + Duration::hours(2);
        let slot = Slot::new(ProviderId::new(), start, start + Duration::hours(1));
        assert_eq!(slot.status, SlotStatus::Available);
        assert!(slot.is_consistent());
        assert_eq!(slot.duration_minutes(), 60);
    }

    #[test]
    fn booked_without_customer_is_inconsistent() {
        let start = Utc::now();
        let mut slot = Slot::new(ProviderId::new(), start, start + Duration::hours(1));
        slot.status = SlotStatus::Booked;
        assert!(!slot.is_consistent());
        slot.customer_id = Some(UserId::new());
        assert!(slot.is_consistent());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [SlotStatus::Available, SlotStatus::Booked, SlotStatus::Confirmed] {
            assert_eq!(status.as_str().parse::<SlotStatus>(), Ok(status));
        }
        assert!("held".parse::<SlotStatus>().is_err());
    }
}
