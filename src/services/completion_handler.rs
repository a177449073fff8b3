//! Task completion handler.
//!
//! Consumes `task.completed` events and spawns the successor instance
//! for recurring tasks. Redeliveries are absorbed by a deterministic
//! dedup key derived from the completion itself, so the successor is
//! created exactly once no matter how many times the bus retries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{AckDecision, EngineResult};
use crate::domain::models::{EventEnvelope, EventPayload, NewTask, Task};
use crate::domain::next_due;
use crate::domain::ports::{EventHandler, TaskRepository};

/// Dedup key for the successor of one completion. Deterministic over
/// `(task_id, completed_at)`: a redelivered envelope carries the same
/// pair and therefore the same key.
pub fn completion_dedup_key(task_id: Uuid, completed_at: DateTime<Utc>) -> String {
    format!("{}:{}", task_id, completed_at.to_rfc3339())
}

pub struct TaskCompletionHandler {
    repo: Arc<dyn TaskRepository>,
}

impl TaskCompletionHandler {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    /// Spawn the recurring successor, if the completed task recurs.
    ///
    /// Returns the successor task, or `None` for one-shot tasks and
    /// envelopes this handler does not consume.
    pub async fn process(&self, envelope: &EventEnvelope) -> EngineResult<Option<Task>> {
        let EventPayload::TaskCompleted {
            title,
            description,
            priority,
            tags,
            recurrence,
            completed_at,
            ..
        } = &envelope.payload
        else {
            tracing::debug!(event_type = envelope.event_type(), "ignoring non-completion event");
            return Ok(None);
        };

        let Some(rule) = recurrence else {
            tracing::debug!(task_id = %envelope.task_id, "task has no recurrence, skipping");
            return Ok(None);
        };

        let mut successor = NewTask::new(envelope.owner_id, title.clone())
            .with_priority(*priority)
            .with_tags(tags.clone())
            .with_recurrence(*rule)
            .with_due_at(next_due(*completed_at, *rule))
            .with_dedup_key(completion_dedup_key(envelope.task_id, *completed_at));
        successor.description = description.clone();

        let spawned = self.repo.insert(successor).await?;

        tracing::info!(
            task_id = %envelope.task_id,
            successor_id = %spawned.id,
            rule = rule.as_str(),
            due_at = ?spawned.due_at,
            "spawned recurring successor"
        );
        Ok(Some(spawned))
    }
}

#[async_trait]
impl EventHandler for TaskCompletionHandler {
    fn name(&self) -> &'static str {
        "task-completion"
    }

    async fn handle(&self, raw: &[u8]) -> AckDecision {
        let envelope = match EventEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(
                    %err,
                    payload = %String::from_utf8_lossy(raw),
                    "poison task event"
                );
                return AckDecision::Poison;
            }
        };

        match self.process(&envelope).await {
            Ok(_) => AckDecision::Ack,
            Err(err) => {
                let decision = err.disposition();
                tracing::warn!(task_id = %envelope.task_id, %err, ?decision, "completion handling failed");
                decision
            }
        }
    }
}
