pub mod config;
pub mod event;
pub mod task;

pub use config::{Config, DatabaseConfig, LoggingConfig, ScannerConfig};
pub use event::{
    EventEnvelope, EventPayload, Subscription, REMINDERS_TOPIC, TASK_EVENTS_TOPIC,
};
pub use task::{NewTask, Recurrence, Task, TaskPriority, TaskStatus};
