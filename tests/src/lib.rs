//! # Courier Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Flows crossing the bus and service crates
//! │   ├── bus_flows.rs
//! │   └── stack_flows.rs
//! └── benches/           # Criterion benchmarks
//!     └── bus_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p courier-tests
//! cargo test -p courier-tests integration::stack_flows
//! cargo bench -p courier-tests
//! ```

#![allow(dead_code)]

pub mod integration;
