//! Reminder delivery handler.
//!
//! Consumes `task.reminder` events, renders the user-visible line, and
//! hands it to the notification sink. Safe under redelivery: a
//! duplicate event at worst produces a duplicate notification record,
//! never a crash or corrupted state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::{AckDecision, EngineResult};
use crate::domain::models::{EventEnvelope, EventPayload};
use crate::domain::ports::{EventHandler, ReminderSink};

pub struct ReminderDeliveryHandler {
    sink: Arc<dyn ReminderSink>,
}

impl ReminderDeliveryHandler {
    pub fn new(sink: Arc<dyn ReminderSink>) -> Self {
        Self { sink }
    }

    pub async fn process(&self, envelope: &EventEnvelope) -> EngineResult<()> {
        let EventPayload::TaskReminder { title, overdue_by_minutes, .. } = &envelope.payload
        else {
            tracing::debug!(event_type = envelope.event_type(), "ignoring non-reminder event");
            return Ok(());
        };

        let message = render_reminder(title, *overdue_by_minutes);
        self.sink.deliver(envelope.owner_id, &message).await?;

        tracing::info!(
            task_id = %envelope.task_id,
            owner_id = %envelope.owner_id,
            overdue_by_minutes,
            "reminder delivered"
        );
        Ok(())
    }
}

/// Human-readable reminder line combining title and lateness.
fn render_reminder(title: &str, overdue_by_minutes: i64) -> String {
    let lateness = match overdue_by_minutes {
        m if m <= 0 => "due now".to_string(),
        1 => "overdue by 1 minute".to_string(),
        m => format!("overdue by {m} minutes"),
    };
    format!("⏰ Reminder: your task '{title}' is {lateness}!")
}

#[async_trait]
impl EventHandler for ReminderDeliveryHandler {
    fn name(&self) -> &'static str {
        "reminder-delivery"
    }

    async fn handle(&self, raw: &[u8]) -> AckDecision {
        let envelope = match EventEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(
                    %err,
                    payload = %String::from_utf8_lossy(raw),
                    "poison reminder event"
                );
                return AckDecision::Poison;
            }
        };

        match self.process(&envelope).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                let decision = err.disposition();
                tracing::warn!(task_id = %envelope.task_id, %err, ?decision, "reminder delivery failed");
                decision
            }
        }
    }
}
