use async_trait::async_trait;

use crate::domain::errors::{AckDecision, EngineResult};
use crate::domain::models::EventEnvelope;

/// Client port for the topic-routed, at-least-once message bus.
///
/// The transport is an external collaborator; the engine only publishes
/// and declares which (topic, route) pairs it wants deliveries on. The
/// bus may redeliver any envelope after a handler failure or timeout.
#[async_trait]
pub trait EventBusClient: Send + Sync {
    /// Publish an envelope to a topic. Failures surface as
    /// `EngineError::Publish`; they are never silently swallowed.
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> EngineResult<()>;
}

/// A consumer the bus invokes on delivery.
///
/// Handlers receive the raw delivery body and return an explicit
/// [`AckDecision`]; no error or panic crosses back into the transport.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs and subscription wiring.
    fn name(&self) -> &'static str;

    /// Process one delivery.
    async fn handle(&self, raw: &[u8]) -> AckDecision;
}
