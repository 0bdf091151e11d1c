//! # Stack Manager
//!
//! Owns the stack at every configured location and answers for it on the
//! request bus:
//!
//! | Topic | Payload | Answer |
//! |-------|---------|--------|
//! | `stack.get` | [`LocationQuery`] | [`Stack`] or `STACK_NOT_FOUND` |
//! | `stack.list` | ignored | map of location to [`Stack`] |
//! | `stack.update` | [`UpdateStack`] | updated [`Stack`], then `stack.changed` |

use crate::error::StackError;
use crate::messages::{LocationQuery, StackChanged, UpdateStack};
use crate::stack::Stack;
use crate::{TOPIC_CHANGED, TOPIC_GET, TOPIC_LIST, TOPIC_UPDATE};
use courier_bus::{
    typed_handler, ApplicationError, CancellationToken, EventBus, Request, RequestBus,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Seed values for a location nobody has configured yet.
const DEFAULT_NAME: &str = "test";
const DEFAULT_DESCRIPTION: &str = "test";
const DEFAULT_STACK_COUNT: u32 = 2;

pub struct StackManager {
    stacks: RwLock<BTreeMap<String, Stack>>,
}

impl StackManager {
    /// One default stack per location.
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stacks = locations
            .into_iter()
            .map(|location| {
                (
                    location.into(),
                    Stack::new(DEFAULT_NAME, DEFAULT_DESCRIPTION, DEFAULT_STACK_COUNT),
                )
            })
            .collect();

        Self {
            stacks: RwLock::new(stacks),
        }
    }

    pub fn get(&self, location: &str) -> Result<Stack, StackError> {
        self.stacks
            .read()
            .get(location)
            .cloned()
            .ok_or_else(|| StackError::NotFound(location.to_string()))
    }

    pub fn list(&self) -> BTreeMap<String, Stack> {
        self.stacks.read().clone()
    }

    pub fn locations(&self) -> Vec<String> {
        self.stacks.read().keys().cloned().collect()
    }

    pub fn update(&self, change: &UpdateStack) -> Result<Stack, StackError> {
        let mut stacks = self.stacks.write();
        let stack = stacks
            .get_mut(&change.location)
            .ok_or_else(|| StackError::NotFound(change.location.clone()))?;

        stack.update_config(&change.name, &change.description, change.disabled);
        debug!(location = %change.location, name = %change.name, disabled = change.disabled, "Stack updated");
        Ok(stack.clone())
    }

    /// Register the `stack.*` handlers. Updates are announced on `events`.
    pub fn attach(self: &Arc<Self>, requests: &RequestBus, events: EventBus) {
        let manager = Arc::clone(self);
        requests.register_handler(
            TOPIC_GET,
            typed_handler(move |_ctx, query: LocationQuery| {
                let manager = Arc::clone(&manager);
                async move { manager.get(&query.location).map_err(ApplicationError::from) }
            }),
        );

        let manager = Arc::clone(self);
        requests.register_handler(TOPIC_LIST, move |_ctx: CancellationToken, _req: Request| {
            let manager = Arc::clone(&manager);
            async move {
                serde_json::to_value(manager.list())
                    .map_err(|e| ApplicationError::new(format!("unserializable stacks: {e}")))
            }
        });

        let manager = Arc::clone(self);
        requests.register_handler(
            TOPIC_UPDATE,
            typed_handler(move |_ctx, change: UpdateStack| {
                let manager = Arc::clone(&manager);
                let events = events.clone();
                async move {
                    let stack = manager.update(&change)?;
                    let announcement = StackChanged {
                        location: change.location,
                        stack: stack.clone(),
                    };
                    let payload = serde_json::to_value(&announcement)
                        .map_err(|e| ApplicationError::new(format!("unserializable stack: {e}")))?;
                    events.publish(TOPIC_CHANGED, payload);
                    Ok::<_, ApplicationError>(stack)
                }
            }),
        );

        info!(locations = self.stacks.read().len(), "Stack handlers attached");
    }
}
