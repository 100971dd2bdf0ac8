//! In-process event source fed through a tokio channel.
//!
//! Lets an embedding transport (or a test) push events into the runtime.

use async_trait::async_trait;
use cadence_core::{EventSource, InboundEvent};
use tokio::sync::mpsc;

pub struct ChannelEventSource {
    rx: mpsc::Receiver<InboundEvent>,
}

impl ChannelEventSource {
    /// Create a source and the sender that feeds it.
    pub fn new(capacity: usize) -> (mpsc::Sender<InboundEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }
}
