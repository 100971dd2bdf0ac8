//! JSON-lines event source.
//!
//! Reads one [`InboundEvent`] per line, e.g.
//!
//! ```text
//! {"session_key":"chat-1","event_id":"m-1","text":"hello"}
//! ```
//!
//! Blank lines are ignored; malformed lines are logged and skipped. Used for
//! local development with stdin standing in for the chat transport.

use async_trait::async_trait;
use cadence_core::{EventSource, InboundEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: u64,
    skipped: u64,
}

impl JsonLinesSource<BufReader<Stdin>> {
    /// Read events from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines rejected as malformed so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Option<InboundEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(lines = self.line_no, "Event input closed");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read event input");
                    return None;
                }
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<InboundEvent>(line) {
                Ok(event) => return Some(event),
                Err(e) => {
                    self.skipped += 1;
                    warn!(line = self.line_no, error = %e, "Skipping malformed event");
                }
            }
        }
    }
}
