//! In-process event bus adapter.
//!
//! Topic-routed broadcast transport for the standalone runtime and for
//! tests. It honors the at-least-once contract the engine is written
//! against: a `Retry` outcome re-enqueues the delivery (with a bounded
//! attempt count so a persistently failing message cannot loop forever),
//! and slow consumers may observe redeliveries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::domain::errors::{AckDecision, EngineError, EngineResult};
use crate::domain::models::EventEnvelope;
use crate::domain::ports::{EventBusClient, EventHandler};

/// Configuration for the in-process bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Capacity of each topic's broadcast channel.
    pub channel_capacity: usize,
    /// Attempts per delivery before it is dropped with an error log.
    pub max_delivery_attempts: u32,
    /// Pause before a retried delivery is re-enqueued.
    pub redelivery_delay: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            max_delivery_attempts: 5,
            redelivery_delay: Duration::from_millis(200),
        }
    }
}

/// One delivery of a published envelope to a topic's consumers.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub attempt: u32,
    pub body: Arc<Vec<u8>>,
}

/// Broadcast-channel bus keyed by topic name.
pub struct InMemoryEventBus {
    config: BusConfig,
    topics: RwLock<HashMap<String, broadcast::Sender<Delivery>>>,
}

impl InMemoryEventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Delivery> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.clone();
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.config.channel_capacity).0)
            .clone()
    }

    /// Subscribe to raw deliveries on a topic.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Delivery> {
        self.sender(topic).await.subscribe()
    }

    /// Spawn a consumer loop that feeds a handler from a topic and acts
    /// on its [`AckDecision`]s. Runs until the bus is dropped.
    ///
    /// The subscription is taken before this returns, so a publish
    /// immediately after `attach` cannot be missed.
    pub async fn attach(
        self: &Arc<Self>,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> JoinHandle<()> {
        let mut rx = self.subscribe(topic).await;
        let bus = Arc::clone(self);
        let topic = topic.to_string();

        tokio::spawn(async move {
            tracing::info!(topic = %topic, handler = handler.name(), "consumer attached");

            loop {
                let delivery = match rx.recv().await {
                    Ok(delivery) => delivery,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped, "consumer lagged; deliveries skipped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                match handler.handle(&delivery.body).await {
                    AckDecision::Ack => {}
                    AckDecision::Poison => {
                        tracing::error!(
                            topic = %topic,
                            handler = handler.name(),
                            "poison message acknowledged and dropped"
                        );
                    }
                    AckDecision::Retry => {
                        if delivery.attempt >= bus.config.max_delivery_attempts {
                            tracing::error!(
                                topic = %topic,
                                handler = handler.name(),
                                attempts = delivery.attempt,
                                "delivery dropped after exhausting retries"
                            );
                            continue;
                        }
                        let sender = bus.sender(&topic).await;
                        let next = Delivery {
                            attempt: delivery.attempt + 1,
                            body: delivery.body,
                        };
                        let delay = bus.config.redelivery_delay;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = sender.send(next);
                        });
                    }
                }
            }
        })
    }
}

#[async_trait]
impl EventBusClient for InMemoryEventBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> EngineResult<()> {
        let body = envelope.encode().map_err(|e| EngineError::Publish {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

        let sender = self.sender(topic).await;
        // A send error only means nobody is subscribed yet; the engine
        // treats discovery-time wiring as the operator's concern.
        let _ = sender.send(Delivery {
            attempt: 1,
            body: Arc::new(body),
        });
        Ok(())
    }
}
