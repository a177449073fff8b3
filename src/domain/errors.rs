//! Error taxonomy for the tickler engine.
//!
//! Every failure a handler can see maps to an explicit acknowledge/retry
//! decision; nothing escapes to the bus runtime as an uncaught panic.

use thiserror::Error;
use uuid::Uuid;

/// Engine-level errors, classified by how a handler must react.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced task no longer exists; retrying cannot help.
    #[error("task not found: {0}")]
    NotFound(Uuid),

    /// Repository write race; retry once with a fresh read.
    #[error("conflicting write on task {0}")]
    Conflict(Uuid),

    /// Repository or bus unavailable; surfaced so the bus redelivers.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    /// Envelope does not parse; poison message, quarantined not retried.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),

    /// Publish to the bus failed; the triggering state is left untouched
    /// so the next tick or redelivery retries it.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::TransientIo(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::MalformedPayload(err.to_string())
    }
}

/// Explicit handler outcome returned to the delivery mechanism.
///
/// `Ack` consumes the delivery. `Retry` leaves it unacknowledged so the
/// bus redelivers. `Poison` acknowledges a message that can never be
/// processed, after logging it for diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    Retry,
    Poison,
}

impl EngineError {
    /// Map an error class to the handler outcome required by the
    /// at-least-once contract.
    pub fn disposition(&self) -> AckDecision {
        match self {
            // The task is gone; redelivery cannot bring it back.
            Self::NotFound(_) => AckDecision::Ack,
            Self::Conflict(_) | Self::TransientIo(_) | Self::Publish { .. } => AckDecision::Retry,
            Self::MalformedPayload(_) => AckDecision::Poison,
        }
    }
}
