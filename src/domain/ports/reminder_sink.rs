use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::EngineResult;

/// Sink port for user-visible reminder notifications.
///
/// The rendering surface (conversation log, chat UI) is an external
/// collaborator; the engine only guarantees a durable record is
/// produced for the owner. Duplicate deliveries may produce duplicate
/// records, which downstream surfaces tolerate.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    /// Persist a notification message for the given owner.
    async fn deliver(&self, owner_id: Uuid, message: &str) -> EngineResult<()>;
}
