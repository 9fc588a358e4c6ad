//! The admission engine: queue orchestration, eligibility, ETA estimation
//! and reclamation.
//!
//! This crate is the seam between `waitline-store` (raw Redis primitives)
//! and the HTTP surface: it owns every decision (component I), every
//! derived number (component H.4) and the request orchestration itself
//! (component J), but never the wire format or the transport. A gateway
//! embeds an [`orchestrator::Engine`] behind its own `AppState` and a
//! [`reclaimer::spawn`] background task alongside it.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod eligibility;
pub mod error;
pub mod eta;
pub mod orchestrator;
pub mod reclaimer;

pub use error::{EligibilityReason, EngineError, Result};
pub use orchestrator::{Engine, EnterOutcome, JoinOutcome, JoinRequest, StatusOutcome};
