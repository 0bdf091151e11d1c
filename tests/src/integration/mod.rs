//! Cross-crate integration flows.

pub mod bus_flows;
pub mod stack_flows;
