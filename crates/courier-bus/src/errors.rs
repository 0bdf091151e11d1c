//! # Error Types
//!
//! Transport failures are [`RequestError`]s and come back as the `Err` side of
//! a call. Business failures are [`ApplicationError`]s and only ever travel
//! inside a [`Response`](crate::Response).

use crate::event_bus::SubscriptionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors from event bus operations.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// No subscriptions exist for the topic.
    #[error("event '{0}' not found")]
    TopicNotFound(String),

    /// The id is not subscribed under the topic.
    #[error("subscription ID {id} not found for event '{topic}'")]
    SubscriptionNotFound { topic: String, id: SubscriptionId },

    /// A handler failed during synchronous delivery.
    #[error("handler {id} for event '{topic}' failed: {source}")]
    Handler {
        topic: String,
        id: SubscriptionId,
        #[source]
        source: anyhow::Error,
    },
}

/// Bus-level failures to deliver or resolve a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// No handler bound to the topic. Detected before any waiting.
    #[error("no handler registered for topic '{0}'")]
    HandlerNotFound(String),

    /// No response within the configured window.
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    /// The caller's context was cancelled.
    #[error("request cancelled by caller")]
    Cancelled,

    /// The handler panicked before producing a result.
    #[error("handler for topic '{0}' panicked")]
    HandlerPanicked(String),

    /// A chain step failed at the transport level.
    #[error("chain failed at topic '{topic}': {source}")]
    ChainStep {
        topic: String,
        source: Box<RequestError>,
    },

    /// One branch of a parallel call failed.
    #[error("request to '{topic}' failed: {source}")]
    Branch {
        topic: String,
        source: Box<RequestError>,
    },

    /// Summary of a parallel call with failing branches. Only the first
    /// failure is carried.
    #[error("parallel requests had {failures} errors: {first}")]
    Aggregate {
        failures: usize,
        #[source]
        first: Box<RequestError>,
    },

    /// Every retry attempt failed.
    #[error("request failed after {attempts} retries: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<RequestError>,
    },
}

impl RequestError {
    /// Innermost error once chain/branch/aggregate/retry wrappers are peeled off.
    pub fn root_cause(&self) -> &RequestError {
        match self {
            Self::ChainStep { source, .. }
            | Self::Branch { source, .. }
            | Self::RetriesExhausted { source, .. } => source.root_cause(),
            Self::Aggregate { first, .. } => first.root_cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }

    pub fn is_handler_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::HandlerNotFound(_))
    }
}

/// Business-level failure returned by a request handler.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ApplicationError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApplicationError {
    /// Generic failure code.
    pub const INTERNAL: i32 = -32603;

    /// The request payload did not match what the handler expects.
    pub const INVALID_PAYLOAD: i32 = -32602;

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: Self::INTERNAL,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn invalid_payload(reason: impl std::fmt::Display) -> Self {
        Self::new(format!("invalid request data type: {reason}")).with_code(Self::INVALID_PAYLOAD)
    }
}

/// The failure carried inside a [`Response`](crate::Response).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    /// Returned by the handler.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Synthesized for async callbacks when the call itself failed.
    #[error(transparent)]
    Transport(#[from] RequestError),
}
