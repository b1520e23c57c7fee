//! Reservation handlers: single, bulk, cancel.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{BookSlotRequest, BulkBookingRequest, BulkBookingResponse};
use crate::app_state::AppState;
use crate::domain::{Slot, SlotId};
use crate::error::{ErrorResponse, MarketError};
use crate::identity::Caller;
use crate::service::BookingItem;

/// `POST /slots/{id}/book`: reserve one slot.
///
/// # Errors
///
/// Returns [`MarketError::Conflict`] if someone else holds the slot.
#[utoipa::path(
    post,
    path = "/api/v1/slots/{id}/book",
    tag = "Bookings",
    summary = "Reserve a slot",
    description = "Moves an `available` future slot to `booked` for the caller, locking the provider's current hourly rate into the slot.",
    params(("id" = SlotId, Path, description = "Slot identifier")),
    request_body = BookSlotRequest,
    responses(
        (status = 200, description = "Slot reserved", body = Slot),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Terms of service not accepted", body = ErrorResponse),
        (status = 404, description = "Slot or service not found", body = ErrorResponse),
        (status = 409, description = "Slot already taken", body = ErrorResponse),
    )
)]
pub async fn book_slot(
    State(state): State<AppState>,
    caller: Caller,
    Path(slot_id): Path<SlotId>,
    Json(req): Json<BookSlotRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let slot = state
        .reservations
        .book_slot(caller.id(), slot_id, req.service_id)
        .await?;
    Ok(Json(slot))
}

/// `POST /slots/{id}/cancel`: release the caller's reservation.
///
/// # Errors
///
/// Returns [`MarketError::Conflict`] if the caller does not hold the slot or
/// a checkout for it is in progress.
#[utoipa::path(
    post,
    path = "/api/v1/slots/{id}/cancel",
    tag = "Bookings",
    summary = "Cancel a reservation",
    params(("id" = SlotId, Path, description = "Slot identifier")),
    responses(
        (status = 204, description = "Reservation released"),
        (status = 404, description = "Slot not found", body = ErrorResponse),
        (status = 409, description = "Slot not reserved by caller or covered by a pending checkout", body = ErrorResponse),
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(slot_id): Path<SlotId>,
) -> Result<impl IntoResponse, MarketError> {
    state
        .reservations
        .cancel_reservation(caller.id(), slot_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /bookings`: reserve many slots, keeping whatever succeeds.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] if terms are not accepted. Lost
/// races are reported in the body, not as errors.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    summary = "Bulk reserve slots",
    description = "Attempts every requested slot independently. Partial success is normal: the response classifies each id as booked, unavailable or invalid.",
    request_body = BulkBookingRequest,
    responses(
        (status = 200, description = "Classification of every requested slot", body = BulkBookingResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Terms of service not accepted", body = ErrorResponse),
    )
)]
pub async fn book_slots(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<BulkBookingRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let items: Vec<BookingItem> = req.items.into_iter().map(Into::into).collect();
    let outcome = state.reservations.book_slots(caller.id(), &items).await?;
    Ok(Json(BulkBookingResponse::from(outcome)))
}

/// Booking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/slots/{id}/book", post(book_slot))
        .route("/slots/{id}/cancel", post(cancel_reservation))
        .route("/bookings", post(book_slots))
}
