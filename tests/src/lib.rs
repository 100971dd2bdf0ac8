//! # Cadence Test Suite
//!
//! Unified test crate for cross-crate flows, property tests and benchmarks.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Cross-crate flows through the pipeline and runtime
//! └── benches/           # Criterion benchmarks for the hot paths
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cadence-tests
//!
//! # By category
//! cargo test -p cadence-tests integration::pipeline_flows
//! cargo test -p cadence-tests integration::runtime_flows
//! cargo test -p cadence-tests integration::properties
//!
//! # Benchmarks
//! cargo bench -p cadence-tests
//! ```

#![allow(dead_code)]

pub mod integration;
