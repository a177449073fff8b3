//! Task domain model.
//!
//! A task instance is pending until its owner completes it. Recurring
//! tasks are chains of instances: completing one spawns the next with
//! an advanced due date. Instances are never mutated into successors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is open and eligible for reminders
    Pending,
    /// Terminal for this instance; a recurring successor is a new instance
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" | "complete" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Urgent = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Fixed-offset recurrence rule applied when a task is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// A user task instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned at creation
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Optional detail text
    pub description: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// Priority
    pub priority: TaskPriority,
    /// When the task is due; tasks without a due date are never scanned
    pub due_at: Option<DateTime<Utc>>,
    /// Free-form labels, order irrelevant
    pub tags: Vec<String>,
    /// Recurrence rule; absent for one-shot tasks
    pub recurrence: Option<Recurrence>,
    /// Set true exactly once when a reminder is dispatched
    pub reminder_sent: bool,
    /// Idempotency key for deduplicating successor inserts
    pub dedup_key: Option<String>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies when inserting a task. The repository
/// assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub recurrence: Option<Recurrence>,
    pub dedup_key: Option<String>,
}

impl NewTask {
    /// Create a minimal pending task for the given owner.
    pub fn new(owner_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            owner_id,
            title: title.into(),
            description: None,
            priority: TaskPriority::default(),
            due_at: None,
            tags: Vec::new(),
            recurrence: None,
            dedup_key: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the due date.
    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the recurrence rule.
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Set the idempotency key.
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Materialize into a full task with a fresh id and timestamps.
    pub fn into_task(self, now: DateTime<Utc>) -> Task {
        Task {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            status: TaskStatus::Pending,
            priority: self.priority,
            due_at: self.due_at,
            tags: self.tags,
            recurrence: self.recurrence,
            reminder_sent: false,
            dedup_key: self.dedup_key,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Task {
    /// Whether the task is overdue at `now` and still owes a reminder.
    pub fn needs_reminder(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending
            && !self.reminder_sent
            && self.due_at.is_some_and(|due| due < now)
    }
}
