//! Reservation DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ServiceId, SlotId};
use crate::service::{BookingItem, BookingOutcome};

/// Request body for `POST /slots/{id}/book`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookSlotRequest {
    /// Catalog service being booked.
    pub service_id: ServiceId,
}

/// One entry of a bulk booking request.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct BookingItemDto {
    /// Slot to reserve.
    pub slot_id: SlotId,
    /// Catalog service being booked.
    pub service_id: ServiceId,
}

impl From<BookingItemDto> for BookingItem {
    fn from(dto: BookingItemDto) -> Self {
        Self {
            slot_id: dto.slot_id,
            service_id: dto.service_id,
        }
    }
}

/// Request body for `POST /bookings`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkBookingRequest {
    /// Requested reservations; duplicate slot ids are ignored.
    pub items: Vec<BookingItemDto>,
}

/// Response body for `POST /bookings`. Every requested id appears in exactly
/// one list.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkBookingResponse {
    /// Reserved for the caller. Only these may be checked out.
    pub booked_ids: Vec<SlotId>,
    /// Taken, in the past, or lost to a concurrent reservation.
    pub unavailable_ids: Vec<SlotId>,
    /// Unknown slot or service.
    pub invalid_ids: Vec<SlotId>,
    /// Number of booked slots.
    pub count: usize,
}

impl From<BookingOutcome> for BulkBookingResponse {
    fn from(outcome: BookingOutcome) -> Self {
        Self {
            booked_ids: outcome.booked_ids,
            unavailable_ids: outcome.unavailable_ids,
            invalid_ids: outcome.invalid_ids,
            count: outcome.count,
        }
    }
}
