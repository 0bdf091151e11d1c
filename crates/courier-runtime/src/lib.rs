//! # Courier Runtime
//!
//! Builds the two buses and wires the stack service onto them.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Attach the stack manager's request handlers
//! 3. Start the snapshot relay on `stack.changed`
//! 4. Probe `stack.list` to confirm the handlers answer
//!
//! Collaborators receive their buses through constructors; there is no
//! process-global state.

pub mod config;

use anyhow::{Context, Result};
use courier_bus::{EventBus, Payload, RequestBus};
use parking_lot::Mutex;
use stack_service::{SnapshotRelay, SnapshotSink, StackManager};
use std::sync::Arc;
use tracing::{info, warn};

pub use config::{ConfigError, RuntimeConfig};

/// The running process: both buses and everything attached to them.
pub struct CourierRuntime {
    events: EventBus,
    requests: RequestBus,
    stacks: Arc<StackManager>,
    relay: Mutex<Option<SnapshotRelay>>,
}

impl CourierRuntime {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        config.validate().context("Invalid runtime configuration")?;

        if config.stack_locations.is_empty() {
            warn!("No stack locations configured; set COURIER_STACK_LOCATIONS");
        }

        Ok(Self {
            events: EventBus::new(),
            requests: RequestBus::with_config(config.bus.clone()),
            stacks: Arc::new(StackManager::new(config.stack_locations.iter().cloned())),
            relay: Mutex::new(None),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn requests(&self) -> &RequestBus {
        &self.requests
    }

    pub fn stacks(&self) -> Arc<StackManager> {
        Arc::clone(&self.stacks)
    }

    /// Attach handlers, start relaying snapshots into `sink`, then probe.
    pub async fn start(&self, sink: Arc<dyn SnapshotSink>) -> Result<()> {
        info!("===========================================");
        info!("  Courier Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.stacks.attach(&self.requests, self.events.clone());
        *self.relay.lock() = Some(SnapshotRelay::start(&self.events, sink));

        let probe = self
            .requests
            .request(stack_service::TOPIC_LIST, Payload::Null)
            .await
            .context("Stack service did not answer the startup probe")?;
        let locations = probe.payload().and_then(Payload::as_object).map_or(0, |m| m.len());

        info!(
            locations,
            request_topics = ?self.requests.topics(),
            timeout_ms = self.requests.default_timeout().as_millis(),
            "Courier runtime ready"
        );
        Ok(())
    }

    /// Stop relaying and drop every binding on both buses.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        let relay = self.relay.lock().take();
        if let Some(relay) = relay {
            if let Err(e) = relay.stop() {
                warn!(error = %e, "Snapshot relay already detached");
            }
        }
        self.events.clear_all();
        self.requests.clear_all();

        let stats = self.requests.stats();
        info!(
            registered = stats.registered,
            completed = stats.completed,
            timeouts = stats.timeouts,
            cancelled = stats.cancelled,
            late_discarded = stats.late_discarded,
            pending = self.requests.pending_count(),
            "Shutdown complete"
        );
    }
}
