//! SQLite conversation log acting as the reminder sink.
//!
//! Reminder notifications are appended as assistant-role messages to
//! the owner's most recent conversation, creating one when the owner
//! has none yet. The chat surface that renders them lives elsewhere.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::ports::ReminderSink;

const ASSISTANT_ROLE: &str = "assistant";

#[derive(Clone)]
pub struct SqliteConversationLog {
    pool: SqlitePool,
}

impl SqliteConversationLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent conversation for the owner, created on first use.
    async fn get_or_create_conversation(&self, owner_id: Uuid) -> EngineResult<Uuid> {
        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM conversations WHERE owner_id = ? ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(owner_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id,)) = existing {
            return super::parse_uuid(&id);
        }

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO conversations (id, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(conversation_id = %id, owner_id = %owner_id, "created conversation");
        Ok(id)
    }

    /// Count of messages in a conversation. Test/diagnostic helper.
    pub async fn message_count(&self, conversation_id: Uuid) -> EngineResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[async_trait]
impl ReminderSink for SqliteConversationLog {
    async fn deliver(&self, owner_id: Uuid, message: &str) -> EngineResult<()> {
        let conversation_id = self.get_or_create_conversation(owner_id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(conversation_id.to_string())
        .bind(ASSISTANT_ROLE)
        .bind(message)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(conversation_id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::info!(owner_id = %owner_id, conversation_id = %conversation_id, "reminder recorded");
        Ok(())
    }
}
