//! # Courier Bus - In-Process Messaging Core
//!
//! Two collaborating buses for components living in the same process.
//!
//! ## Event Bus
//!
//! Topic-keyed publish/subscribe. Any number of subscribers per topic;
//! `publish` is fire-and-forget, `publish_sync` runs handlers in order and
//! stops at the first failure.
//!
//! ## Request/Response Bus
//!
//! Exactly one handler per topic. Every call gets a correlation id and a slot
//! in the pending-call table; the caller waits for the response, the timeout
//! or its cancellation token, whichever comes first.
//!
//! ```text
//!   caller                     RequestBus                    handler task
//!     │  request_with_timeout()    │                               │
//!     │ ─────────────────────────► │ register(id) ──► pending      │
//!     │                            │ spawn ──────────────────────► │
//!     │                            │                               │ handle()
//!     │                            │ ◄───────── complete(id) ───── │
//!     │ ◄──────── Response ─────── │                               │
//! ```
//!
//! On top of the call primitive: `request_async`, `chain`, `parallel` and
//! `request_with_options` (retry).
//!
//! ## Failure Model
//!
//! - Transport failures ([`RequestError`]) are the `Err` side of a call
//! - Business failures ([`ApplicationError`]) travel inside a [`Response`]

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod combinators;
pub mod config;
pub mod correlation;
pub mod errors;
pub mod event_bus;
pub mod handler;
pub mod message;
mod pending;
pub mod request_bus;

// Re-export main types
pub use combinators::{ParallelResult, RequestOptions};
pub use config::{BusConfig, DEFAULT_REQUEST_TIMEOUT};
pub use correlation::CorrelationId;
pub use errors::{ApplicationError, EventBusError, RequestError, ResponseError};
pub use event_bus::{EventBus, SubscriptionId};
pub use handler::{typed_handler, EventHandler, RequestHandler};
pub use message::{Payload, Request, Response};
pub use pending::{PendingStats, PendingStatsSnapshot};
pub use request_bus::{HandlerId, RequestBus};

/// Cancellation context accepted by every call.
pub use tokio_util::sync::CancellationToken;
