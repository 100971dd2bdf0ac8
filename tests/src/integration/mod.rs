//! Cross-crate integration flows.

pub mod pipeline_flows;
pub mod properties;
pub mod runtime_flows;
