//! Domain layer for the tickler engine
//!
//! This module contains core business logic and domain models.

pub mod errors;
pub mod models;
pub mod ports;
pub mod recurrence;

pub use errors::{AckDecision, EngineError, EngineResult};
pub use recurrence::next_due;
