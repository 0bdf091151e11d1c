//! # Request/Response Bus
//!
//! One handler per topic, and a pending-call table that correlates each
//! dispatched [`Request`] with the caller waiting for it.
//!
//! ## Call lifecycle
//!
//! 1. The handler binding is looked up; a missing binding fails immediately.
//! 2. A pending call is registered under a fresh [`CorrelationId`](crate::CorrelationId).
//! 3. The handler runs on its own task and delivers through the pending table.
//! 4. The caller races the response against the timeout and its context.
//!
//! Whoever removes the pending entry first decides the outcome. The handler
//! is never aborted; if the caller already left, its result is discarded.

use crate::config::BusConfig;
use crate::errors::RequestError;
use crate::handler::RequestHandler;
use crate::message::{Payload, Request, Response};
use crate::pending::{PendingCalls, PendingGuard, PendingStatsSnapshot};
use courier_telemetry::metrics::REQUESTS_SENT;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identifier handed out by [`RequestBus::register_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct HandlerBinding {
    id: HandlerId,
    handler: Arc<dyn RequestHandler>,
}

/// Correlated request/response bus.
///
/// Cloning is cheap; clones share handlers and the pending table.
#[derive(Clone)]
pub struct RequestBus {
    handlers: Arc<RwLock<HashMap<String, HandlerBinding>>>,
    pub(crate) pending: Arc<PendingCalls>,
    next_id: Arc<AtomicU64>,
    config: BusConfig,
}

impl Default for RequestBus {
    fn default() -> Self {
        Self::with_config(BusConfig::default())
    }
}

impl RequestBus {
    /// Bus with the 30 second default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(PendingCalls::default()),
            next_id: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    /// Bind `handler` to `topic`, replacing any previous binding.
    pub fn register_handler<H>(&self, topic: &str, handler: H) -> HandlerId
    where
        H: RequestHandler + 'static,
    {
        let mut handlers = self.handlers.write();
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous = handlers.insert(
            topic.to_string(),
            HandlerBinding {
                id,
                handler: Arc::new(handler),
            },
        );

        match previous {
            Some(old) => debug!(topic, handler = %id, replaced = %old.id, "Replaced request handler"),
            None => debug!(topic, handler = %id, "Registered request handler"),
        }
        id
    }

    /// Drop the binding for `topic`. Calls already dispatched still complete.
    pub fn unregister_handler(&self, topic: &str) -> Result<(), RequestError> {
        let binding = self
            .handlers
            .write()
            .remove(topic)
            .ok_or_else(|| RequestError::HandlerNotFound(topic.to_string()))?;

        debug!(topic, handler = %binding.id, "Unregistered request handler");
        Ok(())
    }

    fn handler(&self, topic: &str) -> Result<Arc<dyn RequestHandler>, RequestError> {
        self.handlers
            .read()
            .get(topic)
            .map(|binding| Arc::clone(&binding.handler))
            .ok_or_else(|| RequestError::HandlerNotFound(topic.to_string()))
    }

    /// Call with the default timeout and no cancellation.
    pub async fn request(&self, topic: &str, payload: Payload) -> Result<Response, RequestError> {
        self.request_with_timeout(&CancellationToken::new(), topic, payload, self.default_timeout())
            .await
    }

    /// Call with the default timeout under the caller's context.
    pub async fn request_with_context(
        &self,
        ctx: &CancellationToken,
        topic: &str,
        payload: Payload,
    ) -> Result<Response, RequestError> {
        self.request_with_timeout(ctx, topic, payload, self.default_timeout())
            .await
    }

    /// The call primitive.
    ///
    /// A returned `Response` may still carry an application error; check
    /// [`Response::application_error`].
    ///
    /// # Errors
    ///
    /// - `HandlerNotFound` - nothing bound to `topic`, returned before any wait
    /// - `Timeout` - no response within `timeout`
    /// - `Cancelled` - `ctx` was cancelled first
    /// - `HandlerPanicked` - the handler panicked
    pub async fn request_with_timeout(
        &self,
        ctx: &CancellationToken,
        topic: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        let handler = self.handler(topic)?;
        if ctx.is_cancelled() {
            return Err(RequestError::Cancelled);
        }

        let request = Request::new(topic, payload);
        let id = request.id;
        let mut rx = self.pending.register(id, topic, timeout);
        let _guard = PendingGuard::new(&self.pending, id);
        REQUESTS_SENT.inc();

        self.dispatch(handler, ctx.clone(), request);

        tokio::select! {
            biased;

            received = &mut rx => received.map_err(|_| RequestError::HandlerPanicked(topic.to_string())),

            () = tokio::time::sleep(timeout) => {
                if self.pending.expire(&id) {
                    Err(RequestError::Timeout(timeout))
                } else {
                    // Lost the race to the handler by a hair.
                    rx.try_recv().map_err(|_| RequestError::Timeout(timeout))
                }
            }

            () = ctx.cancelled() => {
                if self.pending.cancel(&id) {
                    Err(RequestError::Cancelled)
                } else {
                    rx.try_recv().map_err(|_| RequestError::Cancelled)
                }
            }
        }
    }

    fn dispatch(&self, handler: Arc<dyn RequestHandler>, ctx: CancellationToken, request: Request) {
        let pending = Arc::clone(&self.pending);
        let id = request.id;
        let topic = request.topic.clone();

        tokio::spawn(async move {
            match AssertUnwindSafe(handler.handle(ctx, request)).catch_unwind().await {
                Ok(outcome) => {
                    pending.complete(id, Response::from_outcome(id, outcome));
                }
                Err(_) => {
                    warn!(correlation_id = %id, topic = %topic, "Request handler panicked");
                    pending.abandon(&id);
                }
            }
        });
    }

    /// One direct, untimed call to the bound handler on the calling task.
    ///
    /// Despite the name this does not fan out: a topic has a single handler,
    /// so the result always holds exactly one response.
    pub async fn broadcast(
        &self,
        topic: &str,
        payload: Payload,
    ) -> Result<Vec<Response>, RequestError> {
        let handler = self.handler(topic)?;
        let request = Request::new(topic, payload);
        let id = request.id;

        let outcome = AssertUnwindSafe(handler.handle(CancellationToken::new(), request))
            .catch_unwind()
            .await
            .map_err(|_| RequestError::HandlerPanicked(topic.to_string()))?;

        Ok(vec![Response::from_outcome(id, outcome)])
    }

    pub fn has_handler(&self, topic: &str) -> bool {
        self.handlers.read().contains_key(topic)
    }

    /// Topics with a bound handler.
    pub fn topics(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Calls currently waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> PendingStatsSnapshot {
        self.pending.stats().snapshot()
    }

    /// Drop every handler binding.
    pub fn clear_all(&self) {
        self.handlers.write().clear();
    }
}
