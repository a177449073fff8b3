//! Service layer: the engine's handlers and their wiring contracts.

pub mod completion_handler;
pub mod reminder_delivery;
pub mod reminder_scanner;
pub mod task_service;

pub use completion_handler::{completion_dedup_key, TaskCompletionHandler};
pub use reminder_delivery::ReminderDeliveryHandler;
pub use reminder_scanner::{ReminderScanner, TickSummary};
pub use task_service::TaskService;

use crate::domain::models::{Subscription, REMINDERS_TOPIC, TASK_EVENTS_TOPIC};

/// The (topic, route) pairs the engine wants deliveries on. The
/// external bus reads this to wire its subscriptions.
pub fn subscriptions() -> Vec<Subscription> {
    vec![
        Subscription { topic: TASK_EVENTS_TOPIC, route: "/events/task-completed" },
        Subscription { topic: REMINDERS_TOPIC, route: "/events/task-reminder" },
    ]
}
