//! Periodic reminder scanner.
//!
//! On each tick the scanner queries for overdue, unreminded tasks and
//! publishes one `task.reminder` event per task, marking the task only
//! after the publish succeeds. Tasks are processed independently: a
//! failure on one never blocks the rest, and anything missed this tick
//! is picked up on the next. Correctness does not depend on the
//! interval; only promptness does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::errors::EngineResult;
use crate::domain::models::{EventEnvelope, Task, REMINDERS_TOPIC};
use crate::domain::ports::{EventBusClient, TaskRepository};

/// Outcome of one scanner tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Overdue, unreminded tasks the query returned.
    pub scanned: usize,
    /// Reminders successfully published.
    pub published: usize,
    /// Tasks left for the next tick after a publish failure.
    pub failed: usize,
}

pub struct ReminderScanner {
    repo: Arc<dyn TaskRepository>,
    bus: Arc<dyn EventBusClient>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl ReminderScanner {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        bus: Arc<dyn EventBusClient>,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            bus,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one scan against the current wall clock.
    pub async fn tick(&self) -> EngineResult<TickSummary> {
        self.tick_at(Utc::now()).await
    }

    /// Run one scan against an explicit `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> EngineResult<TickSummary> {
        let overdue = self.repo.find_overdue_unnotified(now).await?;
        let mut summary = TickSummary { scanned: overdue.len(), ..Default::default() };

        if overdue.is_empty() {
            tracing::trace!("no overdue tasks this tick");
            return Ok(summary);
        }

        for task in &overdue {
            match self.remind(task, now).await {
                Ok(()) => summary.published += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        task_id = %task.id,
                        %err,
                        "reminder not published; task stays eligible for the next tick"
                    );
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            published = summary.published,
            failed = summary.failed,
            "reminder tick finished"
        );
        Ok(summary)
    }

    async fn remind(&self, task: &Task, now: DateTime<Utc>) -> EngineResult<()> {
        // The repository contract guarantees a due date here; a task
        // without one is simply skipped.
        let Some(envelope) = EventEnvelope::reminder(task, now) else {
            return Ok(());
        };

        self.bus.publish(REMINDERS_TOPIC, &envelope).await?;

        // The flag is only set after a successful publish. If this
        // update fails the task gets a duplicate reminder next tick,
        // which downstream consumers tolerate.
        if let Err(err) = self.repo.mark_reminder_sent(task.id).await {
            tracing::warn!(
                task_id = %task.id,
                %err,
                "reminder published but flag update failed; duplicate possible next tick"
            );
        }
        Ok(())
    }

    /// Start the tick loop. Returns the loop's JoinHandle.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let scanner = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!(interval_secs = scanner.interval.as_secs(), "reminder scanner started");
            while scanner.running.load(Ordering::SeqCst) {
                tokio::time::sleep(scanner.interval).await;
                if !scanner.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = scanner.tick().await {
                    // Query-level failure; the next tick retries from scratch.
                    tracing::error!(%err, "reminder tick failed");
                }
            }
            tracing::info!("reminder scanner stopped");
        })
    }

    /// Stop the tick loop after the current sleep or tick completes.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the tick loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
