//! # slotmarket
//!
//! Slot reservation, checkout and payment reconciliation core for a
//! two-sided booking marketplace.
//!
//! Providers publish hourly slots on a calendar. Customers reserve them,
//! pay through a hosted checkout of an external payment gateway, and the
//! gateway's signed webhooks settle the order. Every state change of a
//! slot or order is a conditional update in the store, so concurrent
//! requests and redelivered webhooks can never double-book or double-pay.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)          Payment gateway
//!     │                                   │ webhooks
//!     ├── REST Handlers (api/)            │
//!     ├── WS Handler (ws/)                │
//!     │                                   │
//!     ├── ReservationService ─┐  CheckoutService ── WebhookReconciler
//!     │                       │        │                  │
//!     ├── EventBus (domain/)  └── BookingLedger / OrderLedger (ledger/)
//!     │                                │
//!     │                        PaymentGateway (gateway/)
//!     │
//!     └── Store: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod persistence;
pub mod service;
pub mod ws;
