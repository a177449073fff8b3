//! Event envelope shared by publishers and handlers.
//!
//! The wire format is flat JSON discriminated by `event_type`, matching
//! what the external bus routes by topic. The set of event types is a
//! closed enum: adding one is a deliberate schema extension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{Recurrence, Task, TaskPriority};

/// Topic carrying task lifecycle events.
pub const TASK_EVENTS_TOPIC: &str = "task-events";

/// Topic carrying reminder events.
pub const REMINDERS_TOPIC: &str = "reminders";

/// Type-specific payload, discriminated by `event_type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// A task was marked completed by its owner.
    #[serde(rename = "task.completed")]
    TaskCompleted {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        priority: TaskPriority,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        recurrence: Option<Recurrence>,
        /// Due date the task carried before completion
        #[serde(default)]
        due_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    },

    /// A pending task crossed its due time without acknowledgment.
    #[serde(rename = "task.reminder")]
    TaskReminder {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        priority: TaskPriority,
        #[serde(default)]
        tags: Vec<String>,
        due_at: DateTime<Utc>,
        /// How far past due the task was at scan time
        overdue_by_minutes: i64,
    },
}

impl EventPayload {
    /// Wire discriminant of this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskCompleted { .. } => "task.completed",
            Self::TaskReminder { .. } => "task.reminder",
        }
    }
}

/// Immutable envelope around a single event occurrence.
///
/// Envelopes are transient; the bus may deliver the same envelope more
/// than once, and handlers are written to tolerate that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub task_id: Uuid,
    pub owner_id: Uuid,
    /// When the triggering action happened, set by the publisher
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Build a `task.completed` envelope from a pre-completion snapshot.
    pub fn completed(task: &Task, completed_at: DateTime<Utc>) -> Self {
        Self {
            task_id: task.id,
            owner_id: task.owner_id,
            occurred_at: completed_at,
            payload: EventPayload::TaskCompleted {
                title: task.title.clone(),
                description: task.description.clone(),
                priority: task.priority,
                tags: task.tags.clone(),
                recurrence: task.recurrence,
                due_at: task.due_at,
                completed_at,
            },
        }
    }

    /// Build a `task.reminder` envelope for an overdue task.
    ///
    /// Returns `None` when the task carries no due date; such tasks are
    /// never eligible for reminders.
    pub fn reminder(task: &Task, now: DateTime<Utc>) -> Option<Self> {
        let due_at = task.due_at?;
        let overdue_by_minutes = (now - due_at).num_minutes();
        Some(Self {
            task_id: task.id,
            owner_id: task.owner_id,
            occurred_at: now,
            payload: EventPayload::TaskReminder {
                title: task.title.clone(),
                description: task.description.clone(),
                priority: task.priority,
                tags: task.tags.clone(),
                due_at,
                overdue_by_minutes,
            },
        })
    }

    /// Wire discriminant of the carried payload.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Serialize for publishing.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(EngineError::from)
    }

    /// Deserialize a raw delivery. Failures map to the poison-message
    /// class: retrying a payload that does not parse cannot help.
    pub fn decode(raw: &[u8]) -> EngineResult<Self> {
        serde_json::from_slice(raw).map_err(EngineError::from)
    }
}

/// A (topic, route) pair the engine wants deliveries on. The external
/// bus reads these to wire its subscriptions; the engine never binds
/// network routes itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub topic: &'static str,
    pub route: &'static str,
}
