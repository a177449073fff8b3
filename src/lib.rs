//! Tickler - Recurring-Task and Reminder Engine
//!
//! Tickler is an event-driven engine that advances user tasks through
//! their lifecycle: completing a recurring task spawns its next
//! occurrence exactly once, and a periodic scanner emits at-most-one
//! reminder per overdue task until acknowledged. The surrounding CRUD
//! surface, authentication, and chat rendering are external
//! collaborators reached through ports.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, recurrence rules, error
//!   taxonomy, and port traits
//! - **Service Layer** (`services`): The completion handler, reminder
//!   scanner, and reminder delivery handler
//! - **Adapter Layer** (`adapters`): SQLite persistence and the
//!   in-process event bus
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tickler::adapters::sqlite::{initialize_database, SqliteTaskRepository};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = initialize_database("sqlite:.tickler/tickler.db", None).await?;
//!     let repo = Arc::new(SqliteTaskRepository::new(pool));
//!     // wire handlers and start the scanner
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AckDecision, EngineError, EngineResult};
pub use domain::models::{
    Config, EventEnvelope, EventPayload, NewTask, Recurrence, Subscription, Task, TaskPriority,
    TaskStatus, REMINDERS_TOPIC, TASK_EVENTS_TOPIC,
};
pub use domain::ports::{EventBusClient, EventHandler, ReminderSink, TaskRepository};
pub use domain::recurrence::next_due;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    subscriptions, ReminderDeliveryHandler, ReminderScanner, TaskCompletionHandler, TaskService,
};
