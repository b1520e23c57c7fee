//! WebSocket layer: connection handling and provider subscriptions.
//!
//! The endpoint at `/ws` streams [`crate::domain::MarketEvent`]s for the
//! providers a client follows. It is read-only.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
