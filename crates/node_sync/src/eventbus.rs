//! # Event Bus Client
//!
//! Durable, at-least-once publish/subscribe with replay (§4.9), grounded
//! on a real JetStream-style durable stream. The node uses `async-nats`'s
//! JetStream client so the batch consumer can resume after a restart
//! without reprocessing already-applied batches.

use std::time::Duration;

use async_nats::jetstream::{self, consumer::DeliverPolicy, stream::RetentionPolicy};
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Subject prefix for origin-region partitions, e.g. `EVENTS.3`.
fn region_subject(stream_name: &str, region_id: u32) -> String {
    format!("{stream_name}.{region_id}")
}

/// Acknowledgement of a successful publish.
#[derive(Clone, Copy, Debug)]
pub struct Ack {
    /// Sequence number assigned by the stream.
    pub sequence: u64,
}

/// A batch record received from the bus, ready for the conflict
/// resolver to consume.
#[derive(Clone, Debug)]
pub struct Message {
    /// Origin region that published this message.
    pub region_id: u32,
    /// Sequence within the origin region's partition, for resuming.
    pub sequence: u64,
    /// Raw (possibly compressed) batch payload.
    pub payload: Vec<u8>,
}

/// Durable, at-least-once pub/sub capability, abstracted behind a trait
/// so the sync pipeline can be tested against an in-memory fake without
/// a running NATS server.
#[async_trait::async_trait]
pub trait EventBusClient: Send + Sync {
    /// Publishes a batch payload under the given origin region's
    /// partition. Returns the assigned sequence on success, or a
    /// transient error the producer should retry with backoff.
    async fn publish(&self, region_id: u32, bytes: Vec<u8>) -> SyncResult<Ack>;

    /// Subscribes to all non-local regions starting at `start_sequence`
    /// (per-region), returning messages in publication order per region.
    async fn subscribe_from(
        &self,
        start_sequence: u64,
    ) -> SyncResult<tokio::sync::mpsc::Receiver<Message>>;
}

/// Configuration for the JetStream-backed event bus client.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    /// NATS server URL.
    pub url: String,
    /// Durable stream name (default `EVENTS`).
    pub stream: String,
    /// Retention window in hours (default 24).
    pub retention_hours: u64,
    /// This node's own region id, excluded from `subscribe_from`.
    pub local_region_id: u32,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            stream: "EVENTS".to_string(),
            retention_hours: 24,
            local_region_id: 0,
        }
    }
}

/// JetStream-backed implementation of [`EventBusClient`].
pub struct NatsEventBus {
    context: jetstream::Context,
    config: EventBusConfig,
}

impl NatsEventBus {
    /// Connects to NATS and ensures the durable stream exists with the
    /// configured retention policy.
    pub async fn connect(config: EventBusConfig) -> SyncResult<Self> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| SyncError::InvalidConfig(format!("failed to connect to NATS: {e}")))?;

        let context = jetstream::new(client);

        let max_age = Duration::from_secs(config.retention_hours * 3600);
        context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![format!("{}.*", config.stream)],
                retention: RetentionPolicy::Limits,
                max_age,
                ..Default::default()
            })
            .await
            .map_err(|e| SyncError::InvalidConfig(format!("failed to create stream: {e}")))?;

        Ok(Self { context, config })
    }
}

#[async_trait::async_trait]
impl EventBusClient for NatsEventBus {
    async fn publish(&self, region_id: u32, bytes: Vec<u8>) -> SyncResult<Ack> {
        let subject = region_subject(&self.config.stream, region_id);

        let publish_ack = self
            .context
            .publish(subject, bytes.into())
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;

        let ack = publish_ack
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;

        Ok(Ack { sequence: ack.sequence })
    }

    async fn subscribe_from(
        &self,
        start_sequence: u64,
    ) -> SyncResult<tokio::sync::mpsc::Receiver<Message>> {
        let stream = self
            .context
            .get_stream(&self.config.stream)
            .await
            .map_err(|e| SyncError::InvalidConfig(format!("stream not found: {e}")))?;

        let consumer = stream
            .create_consumer(jetstream::consumer::pull::Config {
                deliver_policy: DeliverPolicy::ByStartSequence {
                    start_sequence: start_sequence + 1,
                },
                filter_subject: format!("{}.*", self.config.stream),
                ..Default::default()
            })
            .await
            .map_err(|e| SyncError::InvalidConfig(format!("failed to create consumer: {e}")))?;

        let local_region = self.config.local_region_id;
        let stream_name = self.config.stream.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(1024);

        tokio::spawn(async move {
            let Ok(mut messages) = consumer.messages().await else {
                warn!("event bus consumer stream ended before delivering any messages");
                return;
            };

            while let Some(next) = messages.next().await {
                let Ok(message) = next else {
                    warn!("event bus delivery error, skipping message");
                    continue;
                };

                let Some((region_id, sequence)) =
                    parse_subject(&stream_name, &message.subject, &message.info().ok())
                else {
                    continue;
                };

                if region_id == local_region {
                    let _ = message.ack().await;
                    continue;
                }

                let payload = message.payload.to_vec();
                let _ = message.ack().await;

                if tx
                    .send(Message { region_id, sequence, payload })
                    .await
                    .is_err()
                {
                    debug!("event bus receiver dropped, stopping delivery task");
                    break;
                }
            }
        });

        Ok(rx)
    }
}

fn parse_subject(
    stream_name: &str,
    subject: &str,
    info: &Option<jetstream::message::Info<'_>>,
) -> Option<(u32, u64)> {
    let region_id: u32 = subject
        .strip_prefix(&format!("{stream_name}."))?
        .parse()
        .ok()?;
    let sequence = info.as_ref().map_or(0, |i| i.stream_sequence);
    Some((region_id, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_subject_is_namespaced_by_stream_and_region() {
        assert_eq!(region_subject("EVENTS", 3), "EVENTS.3");
    }
}
