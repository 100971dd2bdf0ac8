//! # Inbound Port - EventSource
//!
//! Driving port through which the transport hands inbound events to the core.
//! The transport itself (chat protocol client) lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One inbound event as seen by the core.
///
/// Both identifiers are opaque: `session_key` selects the per-key lane and
/// cooldown slot, `event_id` is what the deduplicator remembers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Logical session (chat, conversation, user) this event belongs to.
    pub session_key: String,
    /// Transport-assigned message identifier.
    #[serde(default)]
    pub event_id: String,
    /// Message body handed to the handler.
    #[serde(default)]
    pub text: String,
}

impl InboundEvent {
    pub fn new(
        session_key: impl Into<String>,
        event_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            event_id: event_id.into(),
            text: text.into(),
        }
    }
}

/// Source of inbound events, in arrival order.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event in arrival order
    /// - `None` - The source is exhausted or closed
    async fn next_event(&mut self) -> Option<InboundEvent>;
}
