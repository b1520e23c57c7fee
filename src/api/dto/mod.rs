//! Data Transfer Objects for REST request/response serialization.
//!
//! Money is carried as integer minor units; instants as RFC 3339 strings.

pub mod booking_dto;
pub mod checkout_dto;
pub mod common_dto;
pub mod slot_dto;

pub use booking_dto::*;
pub use checkout_dto::*;
pub use common_dto::*;
pub use slot_dto::*;
