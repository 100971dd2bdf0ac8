//! # Reply Handler
//!
//! Handles one inbound message for a session:
//!
//! 1. Append the message to the session memory
//! 2. Ask the provider for a reply, through the bounded work queue
//! 3. Append the reply to the memory and hand it back
//!
//! The pipeline guarantees this runs at most once at a time per session, so
//! the history a call sees is never interleaved with another call's.

use crate::handlers::memory::SessionMemory;
use cadence_core::{InboundEvent, ProviderError, ResponseProvider, TaskError, WorkQueue};
use cadence_telemetry::PROVIDER_CALLS;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A generated reply, ready for the transport. The binary writes these to
/// stdout as JSON lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub session_key: String,
    pub event_id: String,
    pub text: String,
}

/// Why a reply could not be produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The queued provider call itself did not finish.
    #[error("Provider call failed: {0}")]
    Task(#[from] TaskError),
}

pub struct ReplyHandler {
    memory: Arc<SessionMemory>,
    provider: Arc<dyn ResponseProvider>,
    queue: WorkQueue,
}

impl ReplyHandler {
    pub fn new(
        memory: Arc<SessionMemory>,
        provider: Arc<dyn ResponseProvider>,
        queue: WorkQueue,
    ) -> Self {
        Self {
            memory,
            provider,
            queue,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<Reply, ReplyError> {
        let history = self
            .memory
            .append(&event.session_key, format!("user: {}", event.text));
        let prompt = history.join("\n");

        let provider = Arc::clone(&self.provider);
        let session = event.session_key.clone();
        let result = self
            .queue
            .submit(move || async move { provider.generate(&session, &prompt).await })
            .await?;

        let text = match result {
            Ok(text) => {
                PROVIDER_CALLS.with_label_values(&["ok"]).inc();
                text
            }
            Err(e) => {
                PROVIDER_CALLS.with_label_values(&["error"]).inc();
                return Err(e.into());
            }
        };

        self.memory
            .append(&event.session_key, format!("assistant: {text}"));
        debug!(
            session = %event.session_key,
            history = history.len() + 1,
            "Reply generated"
        );

        Ok(Reply {
            session_key: event.session_key,
            event_id: event.event_id,
            text,
        })
    }
}
