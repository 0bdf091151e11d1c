//! Payloads exchanged on the stack topics.

use crate::stack::Stack;
use serde::{Deserialize, Serialize};

/// Body of `stack.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationQuery {
    pub location: String,
}

/// Body of `stack.update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStack {
    pub location: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Event published on `stack.changed` after every successful update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackChanged {
    pub location: String,
    pub stack: Stack,
}
