//! Adapters implementing the core's ports for the runtime.
//!
//! - `json_lines`: `EventSource` over any line-oriented reader (stdin)
//! - `channel`: `EventSource` fed from inside the process
//! - `echo_provider`: `ResponseProvider` with simulated latency

pub mod channel;
pub mod echo_provider;
pub mod json_lines;

pub use channel::ChannelEventSource;
pub use echo_provider::EchoProvider;
pub use json_lines::JsonLinesSource;
