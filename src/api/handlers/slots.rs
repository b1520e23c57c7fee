//! Provider calendar handlers: create, list, move, delete.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{patch, post};
use axum::{Json, Router};

use crate::api::dto::{PaginationMeta, SlotListParams, SlotListResponse, SlotTimeRequest};
use crate::app_state::AppState;
use crate::domain::{ProviderId, Slot, SlotId};
use crate::error::{ErrorResponse, MarketError};
use crate::identity::Caller;

/// `POST /providers/{id}/slots`: open a slot on the caller's calendar.
///
/// # Errors
///
/// Returns [`MarketError`] on ownership, policy or overlap failures.
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/slots",
    tag = "Slots",
    summary = "Create a slot",
    description = "Opens an `available` slot. Both ends are truncated to the hour; the slot must have the configured length, start in the future, avoid the blackout hour and not overlap another slot of the provider.",
    params(("id" = ProviderId, Path, description = "Provider identifier")),
    request_body = SlotTimeRequest,
    responses(
        (status = 201, description = "Slot created", body = Slot),
        (status = 400, description = "Slot policy violation", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Caller does not own the provider", body = ErrorResponse),
        (status = 404, description = "Provider not found", body = ErrorResponse),
        (status = 409, description = "Overlaps an existing slot", body = ErrorResponse),
    )
)]
pub async fn create_slot(
    State(state): State<AppState>,
    caller: Caller,
    Path(provider_id): Path<ProviderId>,
    Json(req): Json<SlotTimeRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let slot = state
        .reservations
        .create_slot(caller.id(), provider_id, req.start, req.end)
        .await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// `GET /providers/{id}/slots`: list a provider's calendar.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if the provider does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/providers/{id}/slots",
    tag = "Slots",
    summary = "List slots",
    description = "Returns the provider's slots ordered by start time. With `open_only=true` only future `available` slots are listed.",
    params(("id" = ProviderId, Path, description = "Provider identifier"), SlotListParams),
    responses(
        (status = 200, description = "Paginated slot list", body = SlotListResponse),
        (status = 404, description = "Provider not found", body = ErrorResponse),
    )
)]
pub async fn list_slots(
    State(state): State<AppState>,
    Path(provider_id): Path<ProviderId>,
    Query(params): Query<SlotListParams>,
) -> Result<impl IntoResponse, MarketError> {
    let page = params.page();
    let found = state
        .reservations
        .list_slots(provider_id, params.open_only, page)
        .await?;
    Ok(Json(SlotListResponse {
        data: found.docs,
        pagination: PaginationMeta::new(page, found.total),
    }))
}

/// `PATCH /slots/{id}`: move an available slot.
///
/// # Errors
///
/// Returns [`MarketError`] on ownership, policy, overlap or state failures.
#[utoipa::path(
    patch,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    summary = "Move a slot",
    description = "Moves an `available` slot to a new interval. Fails with 409 if the slot was reserved in the meantime or the new interval overlaps another slot.",
    params(("id" = SlotId, Path, description = "Slot identifier")),
    request_body = SlotTimeRequest,
    responses(
        (status = 200, description = "Slot moved", body = Slot),
        (status = 400, description = "Slot policy violation", body = ErrorResponse),
        (status = 403, description = "Caller does not own the provider", body = ErrorResponse),
        (status = 404, description = "Slot not found", body = ErrorResponse),
        (status = 409, description = "Slot taken or overlapping", body = ErrorResponse),
    )
)]
pub async fn update_slot_time(
    State(state): State<AppState>,
    caller: Caller,
    Path(slot_id): Path<SlotId>,
    Json(req): Json<SlotTimeRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let slot = state
        .reservations
        .update_slot_time(caller.id(), slot_id, req.start, req.end)
        .await?;
    Ok(Json(slot))
}

/// `DELETE /slots/{id}`: delete an available slot.
///
/// # Errors
///
/// Returns [`MarketError`] on ownership or state failures.
#[utoipa::path(
    delete,
    path = "/api/v1/slots/{id}",
    tag = "Slots",
    summary = "Delete a slot",
    params(("id" = SlotId, Path, description = "Slot identifier")),
    responses(
        (status = 204, description = "Slot deleted"),
        (status = 403, description = "Caller does not own the provider", body = ErrorResponse),
        (status = 404, description = "Slot not found", body = ErrorResponse),
        (status = 409, description = "Slot already reserved", body = ErrorResponse),
    )
)]
pub async fn remove_slot(
    State(state): State<AppState>,
    caller: Caller,
    Path(slot_id): Path<SlotId>,
) -> Result<impl IntoResponse, MarketError> {
    state.reservations.remove_slot(caller.id(), slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Slot routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/providers/{id}/slots",
            post(create_slot).get(list_slots),
        )
        .route("/slots/{id}", patch(update_slot_time).delete(remove_slot))
}
