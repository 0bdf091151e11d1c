//! Stack service errors and their wire codes.

use courier_bus::ApplicationError;
use serde_json::json;
use thiserror::Error;

/// Application error codes answered on the request bus.
pub mod codes {
    /// No stack at the requested location.
    pub const STACK_NOT_FOUND: i32 = -32001;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("no stack at location '{0}'")]
    NotFound(String),
}

impl From<StackError> for ApplicationError {
    fn from(err: StackError) -> Self {
        match &err {
            StackError::NotFound(location) => ApplicationError::new(err.to_string())
                .with_code(codes::STACK_NOT_FOUND)
                .with_data(json!({ "location": location })),
        }
    }
}
