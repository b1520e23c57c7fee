//! REST endpoint handlers organized by resource.

pub mod bookings;
pub mod checkout;
pub mod slots;
pub mod system;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(slots::routes())
        .merge(bookings::routes())
        .merge(checkout::routes())
}
