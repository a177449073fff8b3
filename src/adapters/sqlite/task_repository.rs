//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{NewTask, Recurrence, Task, TaskPriority, TaskStatus};
use crate::domain::ports::TaskRepository;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_dedup_key(&self, key: &str) -> EngineResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE dedup_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn get(&self, id: Uuid) -> EngineResult<Task> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => r.try_into(),
            None => Err(EngineError::NotFound(id)),
        }
    }

    async fn insert(&self, new_task: NewTask) -> EngineResult<Task> {
        let task = new_task.into_task(Utc::now());
        let tags_json = serde_json::to_string(&task.tags)?;

        let result = sqlx::query(
            r#"INSERT INTO tasks (id, owner_id, title, description, status, priority,
               due_at, tags, recurrence, reminder_sent, dedup_key, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.owner_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_at.map(|t| t.to_rfc3339()))
        .bind(&tags_json)
        .bind(task.recurrence.map(|r| r.as_str()))
        .bind(i32::from(task.reminder_sent))
        .bind(&task.dedup_key)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(task),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                // A previous delivery already claimed this dedup key;
                // return the row it created instead of a duplicate.
                if let Some(key) = &task.dedup_key {
                    if let Some(existing) = self.find_by_dedup_key(key).await? {
                        tracing::debug!(
                            dedup_key = %key,
                            existing_id = %existing.id,
                            "duplicate insert suppressed"
                        );
                        return Ok(existing);
                    }
                }
                Err(EngineError::Conflict(task.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> EngineResult<Task> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::Conflict(id));
        }

        self.get(id).await
    }

    async fn find_overdue_unnotified(&self, now: DateTime<Utc>) -> EngineResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT * FROM tasks
               WHERE status = 'pending'
                 AND due_at IS NOT NULL
                 AND due_at < ?
                 AND reminder_sent = 0"#,
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn mark_reminder_sent(&self, id: Uuid) -> EngineResult<()> {
        // Set-once at the storage layer: the predicate makes repeat
        // calls (and races between ticks) no-ops.
        sqlx::query(
            "UPDATE tasks SET reminder_sent = 1, updated_at = ? WHERE id = ? AND reminder_sent = 0",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Row from the `tasks` table.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    owner_id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_at: Option<String>,
    tags: String,
    recurrence: Option<String>,
    reminder_sent: i32,
    dedup_key: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = EngineError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status).ok_or_else(|| {
            EngineError::MalformedPayload(format!("unknown task status: {}", row.status))
        })?;
        let priority = TaskPriority::from_str(&row.priority).ok_or_else(|| {
            EngineError::MalformedPayload(format!("unknown task priority: {}", row.priority))
        })?;
        let recurrence = match row.recurrence.as_deref() {
            Some(s) => Some(Recurrence::from_str(s).ok_or_else(|| {
                EngineError::MalformedPayload(format!("unknown recurrence rule: {s}"))
            })?),
            None => None,
        };
        let tags: Vec<String> = serde_json::from_str(&row.tags)?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            title: row.title,
            description: row.description,
            status,
            priority,
            due_at: parse_optional_datetime(row.due_at)?,
            tags,
            recurrence,
            reminder_sent: row.reminder_sent != 0,
            dedup_key: row.dedup_key,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
