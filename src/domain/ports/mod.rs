//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that infrastructure adapters implement:
//! - TaskRepository: durable task storage operations
//! - EventBusClient / EventHandler: publish and consume against the bus
//! - ReminderSink: user-visible notification records
//!
//! These contracts keep the engine independent of any particular
//! database, transport, or rendering surface.

pub mod event_bus;
pub mod reminder_sink;
pub mod task_repository;

pub use event_bus::{EventBusClient, EventHandler};
pub use reminder_sink::ReminderSink;
pub use task_repository::TaskRepository;
