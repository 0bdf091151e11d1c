//! # Event Bus
//!
//! Topic-keyed publish/subscribe with any number of subscribers per topic.
//!
//! Both publish paths copy the subscriber list under the read lock and release
//! it before any handler runs, so a handler may subscribe or unsubscribe
//! without deadlocking. The price is a race: a subscription added or removed
//! while a publish is in flight may or may not see that event.

use crate::errors::EventBusError;
use crate::handler::EventHandler;
use crate::message::Payload;
use courier_telemetry::metrics::{EVENTS_PUBLISHED, EVENT_HANDLER_FAILURES};
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bus-wide subscription identifier. Ascending across all topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct EventSubscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

type Snapshot = Vec<(SubscriptionId, Arc<dyn EventHandler>)>;

/// In-memory event bus.
///
/// Cloning is cheap and every clone shares the same subscription table.
#[derive(Clone, Default)]
pub struct EventBus {
    /// Subscriptions per topic, in registration order.
    subscriptions: Arc<RwLock<HashMap<String, Vec<EventSubscription>>>>,

    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic.
    pub fn subscribe<H>(&self, topic: &str, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        let mut subs = self.subscriptions.write();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        subs.entry(topic.to_string())
            .or_default()
            .push(EventSubscription {
                id,
                handler: Arc::new(handler),
            });

        debug!(topic, subscription = %id, "Subscribed");
        id
    }

    /// Remove one subscription.
    ///
    /// # Errors
    ///
    /// - `EventBusError::TopicNotFound` - the topic has no subscribers
    /// - `EventBusError::SubscriptionNotFound` - `id` is not subscribed under `topic`
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<(), EventBusError> {
        let mut subs = self.subscriptions.write();
        let Some(entries) = subs.get_mut(topic) else {
            return Err(EventBusError::TopicNotFound(topic.to_string()));
        };
        let Some(position) = entries.iter().position(|s| s.id == id) else {
            return Err(EventBusError::SubscriptionNotFound {
                topic: topic.to_string(),
                id,
            });
        };

        entries.remove(position);
        if entries.is_empty() {
            subs.remove(topic);
        }

        debug!(topic, subscription = %id, "Unsubscribed");
        Ok(())
    }

    fn snapshot(&self, topic: &str) -> Snapshot {
        self.subscriptions
            .read()
            .get(topic)
            .map(|entries| {
                entries
                    .iter()
                    .map(|s| (s.id, Arc::clone(&s.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fire-and-forget delivery. Each handler runs on its own task; failures
    /// and panics are logged and counted but never reach the caller.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// The number of handlers dispatched.
    pub fn publish(&self, topic: &str, payload: Payload) -> usize {
        let handlers = self.snapshot(topic);
        EVENTS_PUBLISHED.inc();

        for (id, handler) in &handlers {
            let id = *id;
            let handler = Arc::clone(handler);
            let payload = payload.clone();
            let topic = topic.to_string();

            tokio::spawn(async move {
                match AssertUnwindSafe(handler.handle(payload)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        EVENT_HANDLER_FAILURES.inc();
                        warn!(topic = %topic, subscription = %id, error = %e, "Event handler failed");
                    }
                    Err(_) => {
                        EVENT_HANDLER_FAILURES.inc();
                        warn!(topic = %topic, subscription = %id, "Event handler panicked");
                    }
                }
            });
        }

        debug!(topic, receivers = handlers.len(), "Event published");
        handlers.len()
    }

    /// Deliver to each handler in registration order on the calling task.
    ///
    /// Stops at the first failing handler and returns its error. A panicking
    /// handler unwinds into the caller.
    pub async fn publish_sync(&self, topic: &str, payload: Payload) -> Result<(), EventBusError> {
        let handlers = self.snapshot(topic);
        EVENTS_PUBLISHED.inc();

        for (id, handler) in handlers {
            handler
                .handle(payload.clone())
                .await
                .map_err(|source| EventBusError::Handler {
                    topic: topic.to_string(),
                    id,
                    source,
                })?;
        }
        Ok(())
    }

    /// Drop every subscription for a topic.
    pub fn clear(&self, topic: &str) {
        if self.subscriptions.write().remove(topic).is_some() {
            debug!(topic, "Cleared subscriptions");
        }
    }

    /// Drop every subscription on every topic.
    pub fn clear_all(&self) {
        self.subscriptions.write().clear();
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions.read().get(topic).map_or(0, Vec::len)
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscriber_count(topic) > 0
    }

    /// Topics with at least one subscriber.
    pub fn topics(&self) -> Vec<String> {
        self.subscriptions.read().keys().cloned().collect()
    }
}
