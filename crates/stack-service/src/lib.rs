//! # Stack Service
//!
//! Warehouse stack state exposed on the Courier buses.
//!
//! [`StackManager`] answers `stack.get`, `stack.list` and `stack.update` on
//! the request bus and announces every update on `stack.changed`.
//! [`SnapshotRelay`] picks those announcements up and hands them to a
//! [`SnapshotSink`] for delivery outside the process.
//!
//! ```rust,ignore
//! let manager = Arc::new(StackManager::new(["A1", "A2"]));
//! manager.attach(&requests, events.clone());
//! let relay = SnapshotRelay::start(&events, Arc::new(LogSink));
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod manager;
pub mod messages;
pub mod relay;
pub mod stack;

pub use error::StackError;
pub use manager::StackManager;
pub use messages::{LocationQuery, StackChanged, UpdateStack};
pub use relay::{ChannelSink, LogSink, SnapshotRelay, SnapshotSink};
pub use stack::{CargoData, Stack};

pub const TOPIC_GET: &str = "stack.get";
pub const TOPIC_LIST: &str = "stack.list";
pub const TOPIC_UPDATE: &str = "stack.update";

/// Event topic announcing a stack update.
pub const TOPIC_CHANGED: &str = "stack.changed";
