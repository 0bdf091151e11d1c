//! # Handlers
//!
//! The two callback seams of the buses. Plain async closures implement both
//! traits, so most collaborators never name them:
//!
//! ```rust,ignore
//! events.subscribe("stack.changed", |payload| async move {
//!     tracing::info!(%payload, "stack changed");
//!     Ok(())
//! });
//!
//! requests.register_handler("math.double", |_ctx, req: Request| async move {
//!     let n = req.payload.as_i64().unwrap_or_default();
//!     Ok(serde_json::json!(n * 2))
//! });
//! ```

use crate::errors::ApplicationError;
use crate::message::{Payload, Request};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reacts to events published on a topic.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: Payload) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> anyhow::Result<()> {
        (self)(payload).await
    }
}

/// Answers requests addressed to a topic.
///
/// `ctx` is the caller's cancellation token. The bus never aborts a running
/// handler; long-running handlers may watch `ctx` and stop early.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: CancellationToken,
        request: Request,
    ) -> Result<Payload, ApplicationError>;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(CancellationToken, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, ApplicationError>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: CancellationToken,
        request: Request,
    ) -> Result<Payload, ApplicationError> {
        (self)(ctx, request).await
    }
}

/// Adapt a typed async function into a [`RequestHandler`].
///
/// The payload is deserialized into `T`; a mismatch is answered with an
/// [`ApplicationError::INVALID_PAYLOAD`] error without calling `f`. The
/// result is serialized back into a [`Payload`].
pub fn typed_handler<T, R, F, Fut>(f: F) -> impl RequestHandler
where
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ApplicationError>> + Send + 'static,
{
    let f = Arc::new(f);
    move |ctx: CancellationToken, request: Request| {
        let f = Arc::clone(&f);
        async move {
            let data: T = serde_json::from_value(request.payload)
                .map_err(ApplicationError::invalid_payload)?;
            let output = f(ctx, data).await?;
            serde_json::to_value(output)
                .map_err(|e| ApplicationError::new(format!("unserializable response: {e}")))
        }
    }
}
