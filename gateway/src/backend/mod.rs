//! Downstream reservation and payment backend RPC clients.
//!
//! These sit behind the admission engine, not inside it: by the time a
//! caller holds a `reservation_token`, the engine's job is done. Redeeming
//! that token against the real reservation/payment systems is the external
//! collaborator this module defines the seam for.

pub mod payment;
pub mod reservation;

pub use payment::{PaymentClient, PaymentError};
pub use reservation::{ReservationClient, ReservationError};
