//! Snapshot relay.
//!
//! Listens on `stack.changed` and hands every snapshot to a [`SnapshotSink`].
//! The sink owns delivery to whatever sits outside the process; the relay
//! only decodes and forwards.

use crate::messages::StackChanged;
use crate::TOPIC_CHANGED;
use async_trait::async_trait;
use courier_bus::{EventBus, EventBusError, Payload, SubscriptionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Destination for stack snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn send(&self, snapshot: StackChanged) -> anyhow::Result<()>;
}

/// Writes each snapshot to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl SnapshotSink for LogSink {
    async fn send(&self, snapshot: StackChanged) -> anyhow::Result<()> {
        info!(
            location = %snapshot.location,
            name = %snapshot.stack.name,
            disabled = snapshot.stack.disabled,
            cargo = snapshot.stack.cargo.len(),
            "Stack snapshot"
        );
        Ok(())
    }
}

/// Queues snapshots for a consumer task, such as an outbound stream writer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<StackChanged>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StackChanged>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SnapshotSink for ChannelSink {
    async fn send(&self, snapshot: StackChanged) -> anyhow::Result<()> {
        self.tx
            .send(snapshot)
            .await
            .map_err(|_| anyhow::anyhow!("snapshot consumer closed"))
    }
}

/// Live subscription forwarding `stack.changed` into a sink.
pub struct SnapshotRelay {
    events: EventBus,
    subscription: SubscriptionId,
}

impl SnapshotRelay {
    pub fn start(events: &EventBus, sink: Arc<dyn SnapshotSink>) -> Self {
        let subscription = events.subscribe(TOPIC_CHANGED, move |payload: Payload| {
            let sink = Arc::clone(&sink);
            async move {
                let snapshot: StackChanged = serde_json::from_value(payload)?;
                sink.send(snapshot).await
            }
        });

        info!(subscription = %subscription, "Snapshot relay started");
        Self {
            events: events.clone(),
            subscription,
        }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Stop forwarding.
    pub fn stop(self) -> Result<(), EventBusError> {
        self.events.unsubscribe(TOPIC_CHANGED, self.subscription)?;
        info!(subscription = %self.subscription, "Snapshot relay stopped");
        Ok(())
    }
}
