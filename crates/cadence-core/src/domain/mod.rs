//! Domain layer of the session core.
//!
//! - `store`: generic TTL map every other component is built on
//! - `dedup`, `cooldown`: the two store-backed policies
//! - `serializer`, `work_queue`: the two executors
//! - `task`: packaging shared by both executors

pub mod config;
pub mod cooldown;
pub mod dedup;
pub mod errors;
pub mod serializer;
pub mod store;
pub mod task;
pub mod work_queue;

pub use config::{CooldownConfig, CoreConfig, DedupConfig, PipelineConfig, QueueConfig};
pub use cooldown::CooldownGate;
pub use dedup::{DedupStats, Deduplicator};
pub use errors::{ConfigError, StoreError, TaskError};
pub use serializer::{KeySerializer, SerializerStats};
pub use store::{ExpiringStore, StoreStats, StoreView, DEFAULT_SWEEP_INTERVAL};
pub use task::TaskHandle;
pub use work_queue::{QueueStats, WorkQueue};
