//! Task lifecycle service.
//!
//! The in-crate producer of `task.completed` events: marks a task
//! completed in the repository, then publishes the lifecycle event the
//! completion handler consumes. External CRUD surfaces that mutate
//! status directly are expected to publish the same event themselves.

use std::sync::Arc;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{EventEnvelope, Task, TaskStatus, TASK_EVENTS_TOPIC};
use crate::domain::ports::{EventBusClient, TaskRepository};

pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
    bus: Arc<dyn EventBusClient>,
}

impl TaskService {
    pub fn new(repo: Arc<dyn TaskRepository>, bus: Arc<dyn EventBusClient>) -> Self {
        Self { repo, bus }
    }

    /// Mark a task completed and publish `task.completed`.
    ///
    /// The envelope is built from the pre-completion snapshot so the
    /// completion handler sees the due date and recurrence the task
    /// carried while pending. A write conflict is retried once against
    /// a fresh read before being surfaced.
    pub async fn complete(&self, task_id: uuid::Uuid) -> EngineResult<Task> {
        let snapshot = self.repo.get(task_id).await?;
        if snapshot.status == TaskStatus::Completed {
            tracing::debug!(task_id = %task_id, "task already completed");
            return Ok(snapshot);
        }

        let completed = match self.repo.update_status(task_id, TaskStatus::Completed).await {
            Ok(task) => task,
            Err(EngineError::Conflict(_)) => {
                // Re-read and retry once; a second conflict surfaces.
                let _ = self.repo.get(task_id).await?;
                self.repo.update_status(task_id, TaskStatus::Completed).await?
            }
            Err(err) => return Err(err),
        };

        let envelope = EventEnvelope::completed(&snapshot, completed.updated_at);
        self.bus.publish(TASK_EVENTS_TOPIC, &envelope).await?;

        tracing::info!(task_id = %task_id, "task completed and event published");
        Ok(completed)
    }
}
