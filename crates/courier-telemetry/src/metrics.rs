//! Prometheus metrics for the Courier buses.
//!
//! All metrics follow the naming convention: `courier_<bus>_<metric>_<unit>`.
//! Counters are always live; [`register_metrics`] only makes them visible to
//! [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS
    // =========================================================================

    /// Total publish calls (async and sync)
    pub static ref EVENTS_PUBLISHED: Counter = Counter::new(
        "courier_event_bus_events_published_total",
        "Total number of events published"
    ).expect("metric creation failed");

    /// Handlers that returned an error or panicked during fire-and-forget delivery
    pub static ref EVENT_HANDLER_FAILURES: Counter = Counter::new(
        "courier_event_bus_handler_failures_total",
        "Total number of event handler failures swallowed by publish"
    ).expect("metric creation failed");

    // =========================================================================
    // REQUEST/RESPONSE BUS
    // =========================================================================

    /// Requests dispatched to a handler
    pub static ref REQUESTS_SENT: Counter = Counter::new(
        "courier_request_bus_requests_total",
        "Total number of requests dispatched to a handler"
    ).expect("metric creation failed");

    /// Requests that expired before a response arrived
    pub static ref REQUEST_TIMEOUTS: Counter = Counter::new(
        "courier_request_bus_timeouts_total",
        "Total number of requests that timed out"
    ).expect("metric creation failed");

    /// Requests whose caller context was cancelled
    pub static ref REQUEST_CANCELLATIONS: Counter = Counter::new(
        "courier_request_bus_cancellations_total",
        "Total number of requests cancelled by the caller"
    ).expect("metric creation failed");

    /// Handler results that arrived after the caller stopped waiting
    pub static ref LATE_RESPONSES: Counter = Counter::new(
        "courier_request_bus_late_responses_total",
        "Total number of handler results discarded because nobody was waiting"
    ).expect("metric creation failed");
}

/// Handle to the metrics registry.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Number of metric families currently exported.
    pub fn family_count(&self) -> usize {
        self.registry.gather().len()
    }
}

/// Register all bus metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Event bus
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENT_HANDLER_FAILURES.clone()),
        // Request bus
        Box::new(REQUESTS_SENT.clone()),
        Box::new(REQUEST_TIMEOUTS.clone()),
        Box::new(REQUEST_CANCELLATIONS.clone()),
        Box::new(LATE_RESPONSES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
