//! Ledgers: the only code allowed to change slot and order state.
//!
//! Each transition is a single conditional update through the
//! [`Store`](crate::persistence::Store). There is no read-modify-write path.

pub mod booking;
pub mod order;

pub use booking::BookingLedger;
pub use order::OrderLedger;
