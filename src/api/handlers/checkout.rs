//! Checkout handlers: open a payment session, poll its order.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CheckoutSessionResponse, CreateCheckoutRequest};
use crate::app_state::AppState;
use crate::domain::Order;
use crate::error::{ErrorResponse, MarketError};
use crate::identity::Caller;

/// `POST /checkout/sessions`: open a checkout for reserved slots.
///
/// # Errors
///
/// Returns [`MarketError`] if any slot fails validation or the gateway is
/// unavailable.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions",
    tag = "Checkout",
    summary = "Open a checkout session",
    description = "Validates that every slot is booked by the caller, in the future and of one verified provider; creates a pending order and returns the hosted checkout URL.",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 201, description = "Session opened", body = CheckoutSessionResponse),
        (status = 400, description = "Cart rejected", body = ErrorResponse),
        (status = 403, description = "Slot held by another customer", body = ErrorResponse),
        (status = 404, description = "Slot or provider not found", body = ErrorResponse),
        (status = 409, description = "Slot not reserved", body = ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = ErrorResponse),
    )
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let redirect = state
        .checkout
        .create_session(caller.id(), &req.slot_ids)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutSessionResponse::from(redirect)),
    ))
}

/// `GET /checkout/sessions/{session_id}/order`: poll the order status.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] or [`MarketError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/checkout/sessions/{session_id}/order",
    tag = "Checkout",
    summary = "Order for a checkout session",
    params(("session_id" = String, Path, description = "Gateway checkout session id")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 403, description = "Order belongs to another customer", body = ErrorResponse),
        (status = 404, description = "No order for this session", body = ErrorResponse),
    )
)]
pub async fn get_order_by_session(
    State(state): State<AppState>,
    caller: Caller,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state
        .checkout
        .get_order_by_session_id(caller.id(), &session_id)
        .await?;
    Ok(Json(order))
}

/// Checkout routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/sessions", post(create_checkout_session))
        .route(
            "/checkout/sessions/{session_id}/order",
            get(get_order_by_session),
        )
}
