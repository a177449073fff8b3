//! Event bus adapters.

pub mod in_memory;

pub use in_memory::{BusConfig, Delivery, InMemoryEventBus};
