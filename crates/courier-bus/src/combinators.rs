//! # Combinators
//!
//! Higher-level call patterns built on [`RequestBus::request_with_timeout`].
//! Each one follows the same rule: transport failures are errors, application
//! errors ride inside the returned [`Response`].

use crate::errors::RequestError;
use crate::message::{Payload, Response};
use crate::request_bus::RequestBus;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Knobs for [`RequestBus::request_with_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Per-attempt timeout. `None` or zero uses the bus default.
    pub timeout: Option<Duration>,

    /// Total attempts. Zero is treated as one.
    pub retries: u32,

    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Outcome of [`RequestBus::parallel`].
///
/// `responses` holds every branch that produced a response, application
/// errors included. `error` is set when at least one branch failed at the
/// transport level.
#[derive(Debug, Clone, Default)]
pub struct ParallelResult {
    pub responses: HashMap<String, Response>,
    pub error: Option<RequestError>,
}

impl ParallelResult {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Drop the partial results if any branch failed.
    pub fn into_result(self) -> Result<HashMap<String, Response>, RequestError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.responses),
        }
    }
}

impl RequestBus {
    /// Fire a request and hand the outcome to `callback` on a background task.
    pub fn request_async<F, Fut>(&self, topic: &str, payload: Payload, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(CancellationToken, Response) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.request_async_with_timeout(
            CancellationToken::new(),
            topic,
            payload,
            self.default_timeout(),
            callback,
        )
    }

    /// Like [`request_async`](Self::request_async) with an explicit context
    /// and timeout.
    ///
    /// The callback always runs exactly once. A transport failure reaches it
    /// as [`Response::transport_failure`].
    pub fn request_async_with_timeout<F, Fut>(
        &self,
        ctx: CancellationToken,
        topic: &str,
        payload: Payload,
        timeout: Duration,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(CancellationToken, Response) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let bus = self.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            let response = bus
                .request_with_timeout(&ctx, &topic, payload, timeout)
                .await
                .unwrap_or_else(Response::transport_failure);
            callback(ctx, response).await;
        })
    }

    /// Sequential pipeline: each step receives the previous step's payload.
    ///
    /// Returns the last response, or the first one carrying an application
    /// error. An empty pipeline yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// `ChainStep` naming the topic whose call failed.
    pub async fn chain(
        &self,
        ctx: &CancellationToken,
        topics: &[&str],
        initial: Payload,
    ) -> Result<Option<Response>, RequestError> {
        let mut payload = initial;
        let mut last = None;

        for topic in topics {
            let response = self
                .request_with_context(ctx, topic, payload)
                .await
                .map_err(|source| RequestError::ChainStep {
                    topic: (*topic).to_string(),
                    source: Box::new(source),
                })?;

            if response.application_error().is_some() {
                debug!(topic, "Chain halted by application error");
                return Ok(Some(response));
            }

            payload = response.payload.clone().unwrap_or(Payload::Null);
            last = Some(response);
        }

        Ok(last)
    }

    /// One concurrent request per entry; waits for every branch.
    ///
    /// Only the number of failures and the first failure (in completion
    /// order) are reported.
    pub async fn parallel(
        &self,
        ctx: &CancellationToken,
        payloads: HashMap<String, Payload>,
    ) -> ParallelResult {
        let bus = self;
        let mut branches: FuturesUnordered<_> = payloads
            .into_iter()
            .map(move |(topic, payload)| async move {
                let outcome = bus.request_with_context(ctx, &topic, payload).await;
                (topic, outcome)
            })
            .collect();

        let mut result = ParallelResult::default();
        let mut failures = 0;
        let mut first = None;

        while let Some((topic, outcome)) = branches.next().await {
            match outcome {
                Ok(response) => {
                    result.responses.insert(topic, response);
                }
                Err(source) => {
                    failures += 1;
                    if first.is_none() {
                        first = Some(RequestError::Branch {
                            topic,
                            source: Box::new(source),
                        });
                    }
                }
            }
        }

        result.error = first.map(|first| RequestError::Aggregate {
            failures,
            first: Box::new(first),
        });
        result
    }

    /// Retry the call primitive on transport failure.
    ///
    /// The delay is a plain sleep on the calling task. An application error
    /// counts as success and is returned without retrying.
    ///
    /// # Errors
    ///
    /// `RetriesExhausted` carrying the attempt count and the last failure.
    pub async fn request_with_options(
        &self,
        ctx: &CancellationToken,
        topic: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Response, RequestError> {
        let timeout = options
            .timeout
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| self.default_timeout());
        let attempts = options.retries.max(1);

        let mut attempt = 1;
        loop {
            match self
                .request_with_timeout(ctx, topic, payload.clone(), timeout)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if attempt >= attempts => {
                    return Err(RequestError::RetriesExhausted {
                        attempts,
                        source: Box::new(err),
                    })
                }
                Err(err) => debug!(topic, attempt, error = %err, "Request attempt failed"),
            }

            attempt += 1;
            debug!(topic, attempt, attempts, "Retrying request");
            tokio::time::sleep(options.retry_delay).await;
        }
    }
}
