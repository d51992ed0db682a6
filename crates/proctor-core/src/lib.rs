//! proctor-core: Assessment session lifecycle and integrity engine.
//!
//! This crate owns the session data model, break budgeting and ledger,
//! remaining-time math, the session state machine, violation scoring, the
//! per-candidate generation lock, and the [`service::SessionService`] that
//! ties them together over pluggable storage and question generation.

pub mod budget;
pub mod clock;
pub mod error;
pub mod integrity;
pub mod ledger;
pub mod lifecycle;
pub mod lock;
pub mod model;
pub mod service;
pub mod store;
pub mod timing;
pub mod traits;
