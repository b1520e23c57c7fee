//! Payment gateway webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::WebhookAck;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, MarketError};
use crate::gateway::SIGNATURE_HEADER;

/// `POST /webhooks/payments`: receive a gateway event.
///
/// # Errors
///
/// Returns 400 on signature failure and 500 on processing failure, both of
/// which make the gateway redeliver.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "Webhooks",
    summary = "Payment gateway webhook",
    description = "Verifies the signature header against the raw body, then settles or cancels the referenced order. Events that can never become actionable are acknowledged with 200.",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Handled or intentionally ignored", body = WebhookAck),
        (status = 400, description = "Signature or payload rejected", body = ErrorResponse),
        (status = 500, description = "Processing failed; retry", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, MarketError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state.webhooks.handle(&body, signature).await?;
    Ok(Json(WebhookAck::from(&outcome)))
}

/// Webhook routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(payment_webhook))
}
