//! Stack domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Booker value of a stack nobody has reserved.
pub const UNBOOKED: &str = "none";

/// One storage stack at a warehouse location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub description: String,
    pub disabled: bool,
    pub booker: String,
    /// Number of piles the stack holds.
    pub stack_count: u32,
    pub heights: Vec<u32>,
    pub cargo: Vec<CargoData>,
}

/// An item sitting on a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoData {
    pub id: String,
    /// Opaque, caller-defined attributes.
    #[serde(default)]
    pub metadata: Value,
    pub custom_id: String,
}

impl Stack {
    /// A fresh stack. Always starts unbooked.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        stack_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            disabled: false,
            booker: UNBOOKED.to_string(),
            stack_count,
            heights: Vec::new(),
            cargo: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_heights(mut self, heights: Vec<u32>) -> Self {
        self.heights = heights;
        self
    }

    #[must_use]
    pub fn with_cargo(mut self, cargo: Vec<CargoData>) -> Self {
        self.cargo = cargo;
        self
    }

    pub fn is_booked(&self) -> bool {
        self.booker != UNBOOKED
    }

    /// Replace the operator-editable settings. Cargo and booking are untouched.
    pub fn update_config(&mut self, name: &str, description: &str, disabled: bool) {
        self.name = name.to_string();
        self.description = description.to_string();
        self.disabled = disabled;
    }
}
