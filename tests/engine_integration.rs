//! Integration tests for the recurring-task and reminder engine.
//!
//! These drive the real SQLite adapters end to end:
//! 1. Completing a recurring task spawns its successor exactly once,
//!    even when the bus redelivers the completion event
//! 2. The reminder scanner publishes at most one reminder per task and
//!    isolates per-task failures within a tick
//! 3. The delivery handler tolerates duplicate reminder events

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use tickler::adapters::sqlite::{
    create_migrated_test_pool, SqliteConversationLog, SqliteTaskRepository,
};
use tickler::domain::models::{
    EventEnvelope, NewTask, Recurrence, TaskPriority, TaskStatus, REMINDERS_TOPIC,
};
use tickler::{
    AckDecision, EngineError, EngineResult, EventBusClient, EventHandler, ReminderDeliveryHandler,
    ReminderScanner, TaskCompletionHandler, TaskRepository, TaskService,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Bus double that records every publish.
#[derive(Default)]
struct RecordingBus {
    published: Mutex<Vec<(String, EventEnvelope)>>,
}

impl RecordingBus {
    fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl EventBusClient for RecordingBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> EngineResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }
}

/// Bus double that fails publishes for one poisoned task id.
struct FlakyBus {
    inner: RecordingBus,
    failing_task: Uuid,
}

#[async_trait]
impl EventBusClient for FlakyBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> EngineResult<()> {
        if envelope.task_id == self.failing_task {
            return Err(EngineError::Publish {
                topic: topic.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.publish(topic, envelope).await
    }
}

async fn setup() -> (sqlx::SqlitePool, Arc<SqliteTaskRepository>) {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test pool");
    let repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
    (pool, repo)
}

async fn task_count(pool: &sqlx::SqlitePool) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
        .fetch_one(pool)
        .await
        .expect("count query failed");
    row.0
}

// ---------------------------------------------------------------------------
// Repository behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_insert_and_get_round_trip() {
    let (_pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let due = Utc::now() + Duration::days(1);

    let inserted = repo
        .insert(
            NewTask::new(owner, "Water the plants")
                .with_description("Back porch too")
                .with_priority(TaskPriority::High)
                .with_tags(vec!["home".into(), "garden".into()])
                .with_recurrence(Recurrence::Weekly)
                .with_due_at(due),
        )
        .await
        .unwrap();

    let fetched = repo.get(inserted.id).await.unwrap();
    assert_eq!(fetched, inserted);
    assert_eq!(fetched.status, TaskStatus::Pending);
    assert!(!fetched.reminder_sent);
    assert_eq!(fetched.tags, vec!["home".to_string(), "garden".to_string()]);
}

#[tokio::test]
async fn test_get_missing_task_is_not_found() {
    let (_pool, repo) = setup().await;
    let id = Uuid::new_v4();
    assert!(matches!(repo.get(id).await, Err(EngineError::NotFound(got)) if got == id));
}

#[tokio::test]
async fn test_update_status_on_missing_task_conflicts() {
    let (_pool, repo) = setup().await;
    let result = repo.update_status(Uuid::new_v4(), TaskStatus::Completed).await;
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn test_dedup_key_insert_is_idempotent() {
    let (pool, repo) = setup().await;
    let owner = Uuid::new_v4();

    let first = repo
        .insert(NewTask::new(owner, "Pay rent").with_dedup_key("rent:2025-01"))
        .await
        .unwrap();
    let second = repo
        .insert(NewTask::new(owner, "Pay rent").with_dedup_key("rent:2025-01"))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(task_count(&pool).await, 1);
}

#[tokio::test]
async fn test_mark_reminder_sent_is_idempotent() {
    let (_pool, repo) = setup().await;
    let task = repo
        .insert(NewTask::new(Uuid::new_v4(), "Renew passport").with_due_at(Utc::now()))
        .await
        .unwrap();

    repo.mark_reminder_sent(task.id).await.unwrap();
    repo.mark_reminder_sent(task.id).await.unwrap();
    // Unknown ids are a silent no-op as well.
    repo.mark_reminder_sent(Uuid::new_v4()).await.unwrap();

    assert!(repo.get(task.id).await.unwrap().reminder_sent);
}

#[tokio::test]
async fn test_find_overdue_excludes_null_due_dates() {
    let (_pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let now = Utc::now();

    // No due date: never scanned, no matter how far `now` advances.
    repo.insert(NewTask::new(owner, "Someday maybe")).await.unwrap();
    let far_future = now + Duration::days(10_000);
    assert!(repo.find_overdue_unnotified(far_future).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_overdue_filters_status_flag_and_time() {
    let (_pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let now = Utc::now();

    let overdue = repo
        .insert(NewTask::new(owner, "Overdue").with_due_at(now - Duration::minutes(5)))
        .await
        .unwrap();
    let not_due_yet = repo
        .insert(NewTask::new(owner, "Later").with_due_at(now + Duration::hours(1)))
        .await
        .unwrap();
    let completed = repo
        .insert(NewTask::new(owner, "Done").with_due_at(now - Duration::hours(1)))
        .await
        .unwrap();
    repo.update_status(completed.id, TaskStatus::Completed).await.unwrap();
    let already_reminded = repo
        .insert(NewTask::new(owner, "Reminded").with_due_at(now - Duration::hours(1)))
        .await
        .unwrap();
    repo.mark_reminder_sent(already_reminded.id).await.unwrap();

    let found = repo.find_overdue_unnotified(now).await.unwrap();
    let ids: Vec<Uuid> = found.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![overdue.id]);
    assert!(!ids.contains(&not_due_yet.id));
}

// ---------------------------------------------------------------------------
// Completion handler: recurring spawn semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_completion_spawns_successor_with_advanced_due_date() {
    let (pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let completed_at = Utc::now();

    let original = repo
        .insert(
            NewTask::new(owner, "Daily standup")
                .with_recurrence(Recurrence::Daily)
                .with_due_at(completed_at + Duration::hours(1)),
        )
        .await
        .unwrap();

    let handler = TaskCompletionHandler::new(repo.clone());
    let envelope = EventEnvelope::completed(&original, completed_at);
    let spawned = handler.process(&envelope).await.unwrap().unwrap();

    assert_eq!(spawned.status, TaskStatus::Pending);
    assert!(!spawned.reminder_sent);
    assert_eq!(spawned.due_at.unwrap(), completed_at + Duration::days(1));
    assert_eq!(spawned.recurrence, Some(Recurrence::Daily));
    assert_eq!(spawned.owner_id, owner);
    assert_ne!(spawned.id, original.id);
    assert_eq!(task_count(&pool).await, 2);
}

#[tokio::test]
async fn test_redelivered_completion_spawns_exactly_once() {
    let (pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let completed_at = Utc::now();

    let original = repo
        .insert(
            NewTask::new(owner, "Weekly report")
                .with_recurrence(Recurrence::Weekly)
                .with_due_at(completed_at),
        )
        .await
        .unwrap();

    let handler = TaskCompletionHandler::new(repo.clone());
    let raw = EventEnvelope::completed(&original, completed_at).encode().unwrap();

    // The bus redelivers the identical envelope three times.
    for _ in 0..3 {
        assert_eq!(handler.handle(&raw).await, AckDecision::Ack);
    }

    // Original plus exactly one successor.
    assert_eq!(task_count(&pool).await, 2);
}

#[tokio::test]
async fn test_non_recurring_completion_inserts_nothing() {
    let (pool, repo) = setup().await;
    let original = repo
        .insert(NewTask::new(Uuid::new_v4(), "One-shot errand").with_due_at(Utc::now()))
        .await
        .unwrap();

    let handler = TaskCompletionHandler::new(repo.clone());
    let envelope = EventEnvelope::completed(&original, Utc::now());
    assert_eq!(handler.handle(&envelope.encode().unwrap()).await, AckDecision::Ack);

    assert_eq!(task_count(&pool).await, 1);
}

// ---------------------------------------------------------------------------
// Reminder scanner: at-most-one reminder, per-task isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scanner_publishes_once_then_goes_quiet() {
    let (_pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let now = Utc::now();

    let task = repo
        .insert(NewTask::new(owner, "Submit timesheet").with_due_at(now - Duration::minutes(5)))
        .await
        .unwrap();

    let bus = Arc::new(RecordingBus::default());
    let scanner = ReminderScanner::new(repo.clone(), bus.clone(), std::time::Duration::from_secs(60));

    let first = scanner.tick_at(now).await.unwrap();
    assert_eq!(first.scanned, 1);
    assert_eq!(first.published, 1);
    assert_eq!(first.failed, 0);
    assert_eq!(bus.count(), 1);
    assert!(repo.get(task.id).await.unwrap().reminder_sent);

    {
        let published = bus.published.lock().unwrap();
        assert_eq!(published[0].0, REMINDERS_TOPIC);
        assert_eq!(published[0].1.event_type(), "task.reminder");
        assert_eq!(published[0].1.task_id, task.id);
    }

    // Later ticks see nothing: the flag gates re-notification.
    let second = scanner.tick_at(now + Duration::minutes(5)).await.unwrap();
    assert_eq!(second.scanned, 0);
    assert_eq!(bus.count(), 1);
}

#[tokio::test]
async fn test_scanner_reports_overdue_minutes() {
    let (_pool, repo) = setup().await;
    let now = Utc::now();

    repo.insert(
        NewTask::new(Uuid::new_v4(), "Five minutes late")
            .with_due_at(now - Duration::minutes(5)),
    )
    .await
    .unwrap();

    let bus = Arc::new(RecordingBus::default());
    let scanner = ReminderScanner::new(repo, bus.clone(), std::time::Duration::from_secs(60));
    scanner.tick_at(now).await.unwrap();

    let published = bus.published.lock().unwrap();
    match &published[0].1.payload {
        tickler::EventPayload::TaskReminder { overdue_by_minutes, .. } => {
            assert_eq!(*overdue_by_minutes, 5);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn test_scanner_empty_tick_is_silent_success() {
    let (_pool, repo) = setup().await;
    let bus = Arc::new(RecordingBus::default());
    let scanner = ReminderScanner::new(repo, bus.clone(), std::time::Duration::from_secs(60));

    let summary = scanner.tick_at(Utc::now()).await.unwrap();
    assert_eq!(summary, tickler::services::reminder_scanner::TickSummary::default());
    assert_eq!(bus.count(), 0);
}

#[tokio::test]
async fn test_publish_failure_leaves_task_eligible_and_isolated() {
    let (_pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let now = Utc::now();

    let task_a = repo
        .insert(NewTask::new(owner, "Task A").with_due_at(now - Duration::minutes(10)))
        .await
        .unwrap();
    let task_b = repo
        .insert(NewTask::new(owner, "Task B").with_due_at(now - Duration::minutes(10)))
        .await
        .unwrap();

    let bus = Arc::new(FlakyBus {
        inner: RecordingBus::default(),
        failing_task: task_a.id,
    });
    let scanner = ReminderScanner::new(repo.clone(), bus.clone(), std::time::Duration::from_secs(60));

    let summary = scanner.tick_at(now).await.unwrap();
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.failed, 1);

    // B went out and was marked; A stays eligible for the next tick.
    assert!(repo.get(task_b.id).await.unwrap().reminder_sent);
    assert!(!repo.get(task_a.id).await.unwrap().reminder_sent);

    let published = bus.inner.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.task_id, task_b.id);
}

// ---------------------------------------------------------------------------
// Reminder delivery: conversation log records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delivery_appends_to_conversation_log() {
    let (pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let now = Utc::now();

    let task = repo
        .insert(NewTask::new(owner, "Book flights").with_due_at(now - Duration::minutes(90)))
        .await
        .unwrap();

    let sink = Arc::new(SqliteConversationLog::new(pool.clone()));
    let handler = ReminderDeliveryHandler::new(sink);
    let envelope = EventEnvelope::reminder(&task, now).unwrap();

    assert_eq!(handler.handle(&envelope.encode().unwrap()).await, AckDecision::Ack);

    let row: (String, String) = sqlx::query_as(
        "SELECT role, content FROM messages ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.0, "assistant");
    assert!(row.1.contains("Book flights"));
    assert!(row.1.contains("overdue by 90 minutes"));
}

#[tokio::test]
async fn test_duplicate_reminder_delivery_both_succeed() {
    let (pool, repo) = setup().await;
    let owner = Uuid::new_v4();
    let now = Utc::now();

    let task = repo
        .insert(NewTask::new(owner, "Stretch").with_due_at(now - Duration::minutes(1)))
        .await
        .unwrap();

    let sink = Arc::new(SqliteConversationLog::new(pool.clone()));
    let handler = ReminderDeliveryHandler::new(sink);
    let raw = EventEnvelope::reminder(&task, now).unwrap().encode().unwrap();

    assert_eq!(handler.handle(&raw).await, AckDecision::Ack);
    assert_eq!(handler.handle(&raw).await, AckDecision::Ack);

    // Duplicate records in one conversation, not a crash.
    let conversations: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
        .fetch_one(&pool)
        .await
        .unwrap();
    let messages: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(conversations.0, 1);
    assert_eq!(messages.0, 2);
}

// ---------------------------------------------------------------------------
// Full chain: complete -> event -> successor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_complete_through_bus_spawns_successor() {
    use tickler::adapters::bus::{BusConfig, InMemoryEventBus};

    let (pool, repo) = setup().await;
    let owner = Uuid::new_v4();

    let original = repo
        .insert(
            NewTask::new(owner, "Monthly invoices")
                .with_recurrence(Recurrence::Monthly)
                .with_due_at(Utc::now()),
        )
        .await
        .unwrap();

    let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));
    let handler: Arc<dyn EventHandler> = Arc::new(TaskCompletionHandler::new(repo.clone()));
    let consumer = bus.attach(tickler::TASK_EVENTS_TOPIC, handler).await;

    let service = TaskService::new(repo.clone(), bus.clone());
    let completed = service.complete(original.id).await.unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);

    // The consumer runs asynchronously; wait for the successor row.
    let mut spawned = false;
    for _ in 0..100 {
        if task_count(&pool).await == 2 {
            spawned = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(spawned, "successor task should appear after completion event");

    let successors = repo
        .find_overdue_unnotified(Utc::now() + Duration::days(31))
        .await
        .unwrap();
    assert_eq!(successors.len(), 1);
    assert_eq!(successors[0].recurrence, Some(Recurrence::Monthly));

    consumer.abort();
}
