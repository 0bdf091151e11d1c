//! # Messages
//!
//! Request and response envelopes for the request/response bus.

use crate::correlation::CorrelationId;
use crate::errors::{ApplicationError, RequestError, ResponseError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Anything a handler accepts or produces.
pub type Payload = serde_json::Value;

/// A request as seen by the handler. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub topic: String,
    pub payload: Payload,
    pub id: CorrelationId,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub(crate) fn new(topic: &str, payload: Payload) -> Self {
        Self {
            topic: topic.to_string(),
            payload,
            id: CorrelationId::new(),
            created_at: Utc::now(),
        }
    }

    /// Deserialize the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Outcome of a resolved call.
///
/// A `Response` with `error` set is still a successful delivery: callers must
/// inspect [`Response::application_error`] separately from the transport
/// result of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: Option<CorrelationId>,
    pub payload: Option<Payload>,
    pub error: Option<ResponseError>,
    pub timestamp: DateTime<Utc>,
}

impl Response {
    pub(crate) fn from_outcome(
        request_id: CorrelationId,
        outcome: Result<Payload, ApplicationError>,
    ) -> Self {
        let (payload, error) = match outcome {
            Ok(payload) => (Some(payload), None),
            Err(err) => (None, Some(ResponseError::Application(err))),
        };
        Self {
            request_id: Some(request_id),
            payload,
            error,
            timestamp: Utc::now(),
        }
    }

    /// Response handed to async callbacks when the call never resolved.
    /// Carries no request id and no payload.
    pub fn transport_failure(err: RequestError) -> Self {
        Self {
            request_id: None,
            payload: None,
            error: Some(ResponseError::Transport(err)),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn application_error(&self) -> Option<&ApplicationError> {
        match &self.error {
            Some(ResponseError::Application(err)) => Some(err),
            _ => None,
        }
    }

    pub fn transport_error(&self) -> Option<&RequestError> {
        match &self.error {
            Some(ResponseError::Transport(err)) => Some(err),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<Payload> {
        self.payload
    }

    /// Deserialize the payload, `None` when the response carries none.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.payload.as_ref().map(T::deserialize)
    }
}
