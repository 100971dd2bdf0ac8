//! # Runtime Container
//!
//! Builds and owns every long-lived component of the runtime:
//!
//! ```text
//! RuntimeConfig ──▶ SessionPipeline (dedup, cooldown, serializer, work queue)
//!               ──▶ SessionMemory
//!               ──▶ ReplyHandler (memory + provider via work queue)
//! ```

pub mod config;

pub use config::{MemoryConfig, ProviderConfig, RuntimeConfig};

use crate::handlers::{ReplyHandler, SessionMemory};
use cadence_core::{ConfigError, ResponseProvider, SessionPipeline, StoreError};
use std::sync::Arc;
use tracing::info;

pub struct RuntimeContainer {
    pub config: RuntimeConfig,
    pub pipeline: Arc<SessionPipeline>,
    pub memory: Arc<SessionMemory>,
    pub handler: Arc<ReplyHandler>,
}

impl RuntimeContainer {
    /// Validate `config` and build all components around `provider`.
    pub fn new(
        config: RuntimeConfig,
        provider: Arc<dyn ResponseProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let pipeline = Arc::new(SessionPipeline::new(config.core.clone())?);
        let memory = Arc::new(SessionMemory::new(&config.memory));
        let handler = Arc::new(ReplyHandler::new(
            Arc::clone(&memory),
            provider,
            pipeline.work_queue().clone(),
        ));

        info!(
            concurrency = config.core.queue.concurrency_limit,
            cooldown_ms = config.core.cooldown.window_ms,
            dedup_ttl_ms = config.core.dedup.ttl_ms,
            "Runtime container initialized"
        );

        Ok(Self {
            config,
            pipeline,
            memory,
            handler,
        })
    }

    /// Start the background sweeps of every expiring store.
    pub fn start_sweepers(&self) -> Result<(), StoreError> {
        self.pipeline.start_sweepers()?;
        self.memory.start_sweeper(self.config.memory.sweep_interval())
    }

    /// Destroy every expiring store. Idempotent.
    pub fn shutdown(&self) {
        self.pipeline.shutdown();
        self.memory.destroy();
    }
}
