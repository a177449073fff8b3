use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{NewTask, Task, TaskStatus};

/// Repository port for durable task storage.
///
/// Every operation is a pass-through to the store, no caching. The store
/// must provide per-row atomicity: concurrent handler invocations for
/// different tasks never contend, and duplicates for the same task are
/// absorbed by the idempotent `insert` and `mark_reminder_sent` paths
/// rather than by in-process locks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Get a task by id. `EngineError::NotFound` if it no longer exists.
    async fn get(&self, id: Uuid) -> EngineResult<Task>;

    /// Insert a new task, assigning id and timestamps.
    ///
    /// When `dedup_key` is set and a task with that key already exists,
    /// the existing task is returned and no second row is created. This
    /// is the idempotency store for recurring-successor inserts.
    async fn insert(&self, new_task: NewTask) -> EngineResult<Task>;

    /// Update a task's status. `EngineError::Conflict` if the task no
    /// longer exists (e.g. deleted by a concurrent caller).
    async fn update_status(&self, id: Uuid, status: TaskStatus) -> EngineResult<Task>;

    /// Tasks that are pending, have a due date strictly before `now`,
    /// and have not been reminded yet. Ordering unspecified.
    async fn find_overdue_unnotified(&self, now: DateTime<Utc>) -> EngineResult<Vec<Task>>;

    /// Flip `reminder_sent` to true. Idempotent: a no-op when already
    /// set, and silent when the task has meanwhile disappeared.
    async fn mark_reminder_sent(&self, id: Uuid) -> EngineResult<()>;
}
