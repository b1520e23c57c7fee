//! Domain layer: entities, identifiers, slot policy, checkout metadata and
//! the event system.

pub mod event_bus;
pub mod ids;
pub mod market_event;
pub mod metadata;
pub mod order;
pub mod party;
pub mod policy;
pub mod slot;

pub use event_bus::EventBus;
pub use ids::{OrderId, ProviderId, ServiceId, SlotId, UserId};
pub use market_event::MarketEvent;
pub use metadata::CheckoutMetadata;
pub use order::{NewOrder, Order, OrderStatus};
pub use party::{AccountFlags, Provider, Service, User};
pub use policy::SlotPolicy;
pub use slot::{PriceSnapshot, Slot, SlotStatus};
