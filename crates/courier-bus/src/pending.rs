//! Pending call table.
//!
//! Maps correlation IDs to callers waiting on a request handler. Every exit
//! path (response, timeout, cancellation, handler panic, dropped caller)
//! removes the entry, and only the first remover acts on it. A response that
//! arrives after the entry is gone is counted and discarded; nothing ever
//! waits on a departed caller.

use crate::correlation::CorrelationId;
use crate::message::Response;
use courier_telemetry::metrics::{LATE_RESPONSES, REQUEST_CANCELLATIONS, REQUEST_TIMEOUTS};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct PendingCall {
    sender: oneshot::Sender<Response>,
    topic: String,
    created_at: Instant,
    timeout: Duration,
}

/// Lifetime counters for the pending table.
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
    /// Responses that arrived after their caller stopped waiting.
    pub total_late_discarded: AtomicU64,
}

impl PendingStats {
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            late_discarded: self.total_late_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub late_discarded: u64,
}

#[derive(Default)]
pub(crate) struct PendingCalls {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: PendingStats,
}

impl PendingCalls {
    /// Insert a call and hand back the receiving end of its response slot.
    pub fn register(
        &self,
        id: CorrelationId,
        topic: &str,
        timeout: Duration,
    ) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingCall {
                sender: tx,
                topic: topic.to_string(),
                created_at: Instant::now(),
                timeout,
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(correlation_id = %id, topic, timeout_ms = timeout.as_millis(), "Registered pending call");
        rx
    }

    /// Deliver a handler result.
    ///
    /// Returns false when the caller already left; the response is dropped.
    pub fn complete(&self, id: CorrelationId, response: Response) -> bool {
        let Some((_, call)) = self.pending.remove(&id) else {
            self.discard_late(id, "Late response discarded");
            return false;
        };

        let elapsed = call.created_at.elapsed();
        if call.sender.send(response).is_err() {
            self.discard_late(id, "Caller dropped before response");
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %id,
            topic = call.topic,
            response_time_ms = elapsed.as_millis(),
            "Completed pending call"
        );
        true
    }

    /// Remove a call whose deadline passed.
    pub fn expire(&self, id: &CorrelationId) -> bool {
        let Some((_, call)) = self.pending.remove(id) else {
            return false;
        };

        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        REQUEST_TIMEOUTS.inc();
        warn!(
            correlation_id = %id,
            topic = call.topic,
            timeout_ms = call.timeout.as_millis(),
            "Request timed out"
        );
        true
    }

    /// Remove a call whose caller cancelled.
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        let Some((_, call)) = self.pending.remove(id) else {
            return false;
        };

        self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        REQUEST_CANCELLATIONS.inc();
        debug!(correlation_id = %id, topic = call.topic, "Request cancelled");
        true
    }

    /// Remove a call without counting it. Used when the handler died or the
    /// waiting future was dropped.
    pub fn abandon(&self, id: &CorrelationId) -> bool {
        self.pending.remove(id).is_some()
    }

    fn discard_late(&self, id: CorrelationId, message: &'static str) {
        self.stats.total_late_discarded.fetch_add(1, Ordering::Relaxed);
        LATE_RESPONSES.inc();
        warn!(correlation_id = %id, "{message}");
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Removes the call from the table when the waiting future goes away, whatever
/// the reason. A no-op once another path already removed it.
pub(crate) struct PendingGuard<'a> {
    calls: &'a PendingCalls,
    id: CorrelationId,
}

impl<'a> PendingGuard<'a> {
    pub fn new(calls: &'a PendingCalls, id: CorrelationId) -> Self {
        Self { calls, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.calls.abandon(&self.id);
    }
}
