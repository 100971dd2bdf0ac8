//! # Cadence Session Runtime
//!
//! Reads JSON-lines events from stdin and answers each through the session
//! pipeline with the development echo provider. Replies are written to stdout
//! as JSON lines; logs go to stderr.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics)
//! 2. Load and validate configuration from `CADENCE_*` variables
//! 3. Build the runtime container
//! 4. Run until stdin closes or Ctrl+C
//!
//! ```text
//! $ echo '{"session_key":"chat-1","event_id":"m-1","text":"hello"}' | cadence-runtime
//! {"session_key":"chat-1","event_id":"m-1","text":"echo: hello"}
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_runtime::adapters::{EchoProvider, JsonLinesSource};
use cadence_runtime::container::RuntimeConfig;
use cadence_runtime::handlers::Reply;
use cadence_runtime::SessionRuntime;
use cadence_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry =
        init_telemetry(&telemetry_config).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let provider = Arc::new(EchoProvider::new(
        config.provider.latency(),
        config.provider.jitter(),
    ));
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_replies(reply_rx));
    let runtime = SessionRuntime::new(config, provider)
        .context("Failed to build runtime")?
        .with_reply_sink(reply_tx);

    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.trigger(),
            Err(e) => warn!(error = %e, "Unable to listen for Ctrl+C"),
        }
    });

    info!("Reading events from stdin. Press Ctrl+C to stop.");
    runtime
        .run(JsonLinesSource::stdin())
        .await
        .context("Event loop failed")?;

    // Closing the sink lets the writer flush and exit.
    drop(runtime);
    writer.await.context("Reply writer panicked")??;

    if telemetry_config.metrics_enabled {
        match encode_metrics() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to encode metrics"),
        }
    }

    Ok(())
}

/// Write each reply to stdout as one JSON line.
async fn write_replies(mut replies: mpsc::UnboundedReceiver<Reply>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(reply) = replies.recv().await {
        let mut line = serde_json::to_vec(&reply).context("Failed to encode reply")?;
        line.push(b'\n');
        stdout
            .write_all(&line)
            .await
            .context("Failed to write reply")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }
    Ok(())
}
