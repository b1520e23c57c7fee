//! Service layer: business logic orchestration.
//!
//! [`ReservationService`] handles calendars and reservations,
//! [`CheckoutService`] opens orders and payment sessions, and
//! [`WebhookReconciler`] settles them from gateway events. All three publish
//! [`MarketEvent`](crate::domain::MarketEvent)s through the
//! [`EventBus`](crate::domain::EventBus) after a transition commits.

pub mod checkout;
pub mod reservation;
pub mod webhook;

pub use checkout::{CheckoutPolicy, CheckoutRedirect, CheckoutService};
pub use reservation::{BookingItem, BookingOutcome, ReservationService};
pub use webhook::{WebhookOutcome, WebhookReconciler};
