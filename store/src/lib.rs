//! Sharded Redis primitives backing the admission gateway.
//!
//! This crate owns everything that talks to the store directly: the
//! shard-aware key namer, the three atomic scripts, and per-component
//! storage helpers for the queue record, per-user stream log, position
//! index, heartbeat registry, admission counter and token-bucket governor.
//! `waitline-engine` composes these into the Join/Status/Enter/Leave
//! orchestration and the eligibility/reclamation logic; this crate has no
//! opinion on that composition.

pub mod admission_counter;
pub mod bucket;
pub mod client;
pub mod error;
pub mod events_registry;
pub mod heartbeat;
pub mod keys;
pub mod position_index;
pub mod queue_record;
pub mod scan;
pub mod scripts;
pub mod stream_log;

pub use client::{ClientConfig, StoreClient, StoreConn};
pub use error::{Result, StoreError};
pub use queue_record::QueueRecord;
