//! Event handlers run by the session pipeline.

pub mod memory;
pub mod reply;

pub use memory::SessionMemory;
pub use reply::{Reply, ReplyError, ReplyHandler};
