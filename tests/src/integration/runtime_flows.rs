//! # Runtime Integration Flows
//!
//! Drives `SessionRuntime` end to end with in-process event sources and
//! scripted providers:
//!
//! - Session history is built in order and the provider cap holds
//! - JSON-lines input tolerates blank and malformed lines
//! - Provider failures are counted and do not stall the session
//! - Shutdown abandons work that outlives the grace period

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cadence_core::{InboundEvent, ProviderError, ResponseProvider};
    use cadence_runtime::adapters::{ChannelEventSource, EchoProvider, JsonLinesSource};
    use cadence_runtime::container::RuntimeConfig;
    use cadence_runtime::{RuntimeError, SessionRuntime};
    use cadence_telemetry::{encode_metrics, register_metrics};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(concurrency: usize) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.core.cooldown.window_ms = 0;
        config.core.queue.concurrency_limit = concurrency;
        config
    }

    /// Records prompts per session and the peak number of concurrent calls.
    #[derive(Default)]
    struct RecordingProvider {
        prompts: Mutex<HashMap<String, Vec<String>>>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ResponseProvider for RecordingProvider {
        async fn generate(&self, session_key: &str, prompt: &str) -> Result<String, ProviderError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.prompts
                .lock()
                .entry(session_key.to_string())
                .or_default()
                .push(prompt.to_string());

            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("ack {}", prompt.lines().count()))
        }
    }

    /// Fails every call for sessions starting with `bad`.
    struct FlakyProvider;

    #[async_trait]
    impl ResponseProvider for FlakyProvider {
        async fn generate(&self, session_key: &str, _prompt: &str) -> Result<String, ProviderError> {
            if session_key.starts_with("bad") {
                Err(ProviderError::Unavailable("upstream offline".into()))
            } else {
                Ok("fine".into())
            }
        }
    }

    /// Never answers.
    struct StuckProvider;

    #[async_trait]
    impl ResponseProvider for StuckProvider {
        async fn generate(&self, _session_key: &str, _prompt: &str) -> Result<String, ProviderError> {
            std::future::pending::<Result<String, ProviderError>>().await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_history_order_and_provider_cap() {
        const SESSIONS: usize = 5;
        const TURNS: usize = 3;

        let provider = Arc::new(RecordingProvider::default());
        let runtime = SessionRuntime::new(config(2), provider.clone()).unwrap();
        let (tx, source) = ChannelEventSource::new(64);

        for turn in 0..TURNS {
            for session in 0..SESSIONS {
                tx.send(InboundEvent::new(
                    format!("chat-{session}"),
                    format!("chat-{session}-{turn}"),
                    format!("message {turn}"),
                ))
                .await
                .unwrap();
            }
        }
        drop(tx);

        let stats = runtime.run(source).await.unwrap();
        assert_eq!(stats.received, (SESSIONS * TURNS) as u64);
        assert_eq!(stats.completed, (SESSIONS * TURNS) as u64);
        assert!(provider.peak.load(Ordering::SeqCst) <= 2);

        register_metrics().unwrap();
        let exposition = encode_metrics().unwrap();
        assert!(exposition.contains("cadence_provider_calls_total"));

        let prompts = provider.prompts.lock();
        assert_eq!(prompts.len(), SESSIONS);
        for (session, calls) in prompts.iter() {
            // Each turn adds one user line and one assistant line.
            let line_counts: Vec<usize> = calls.iter().map(|p| p.lines().count()).collect();
            assert_eq!(line_counts, [1, 3, 5], "unexpected history for {session}");
            assert!(calls[2].starts_with("user: message 0\nassistant: ack 1\nuser: message 1"));
        }
    }

    #[tokio::test]
    async fn test_json_lines_input() {
        let input = concat!(
            "{\"session_key\":\"s1\",\"event_id\":\"e1\",\"text\":\"hello\"}\n",
            "\n",
            "not json at all\n",
            "{\"session_key\":\"s1\",\"event_id\":\"e1\",\"text\":\"hello again\"}\n",
            "{\"session_key\":\"s2\",\"text\":\"no id\"}\n",
            "{\"session_key\":\"s2\",\"text\":\"no id\"}\n",
        );
        let provider = Arc::new(EchoProvider::new(Duration::ZERO, Duration::ZERO));
        let runtime = SessionRuntime::new(config(3), provider).unwrap();

        let stats = runtime
            .run(JsonLinesSource::new(input.as_bytes()))
            .await
            .unwrap();

        assert_eq!(stats.received, 4);
        assert_eq!(stats.duplicates, 1);
        // Events without an id are never deduplicated.
        assert_eq!(stats.completed, 3);
    }

    #[tokio::test]
    async fn test_provider_failures_do_not_stall_sessions() {
        let runtime = SessionRuntime::new(config(3), Arc::new(FlakyProvider)).unwrap();
        let (tx, source) = ChannelEventSource::new(16);

        for i in 0..3 {
            tx.send(InboundEvent::new("bad-session", format!("b{i}"), "x"))
                .await
                .unwrap();
            tx.send(InboundEvent::new("good-session", format!("g{i}"), "x"))
                .await
                .unwrap();
        }
        drop(tx);

        let stats = runtime.run(source).await.unwrap();
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.panicked, 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_work_after_grace() {
        let mut config = config(1);
        config.shutdown_grace_ms = 50;
        let runtime = SessionRuntime::new(config, Arc::new(StuckProvider)).unwrap();
        let (tx, source) = ChannelEventSource::new(4);
        let shutdown = runtime.shutdown_handle();

        tx.send(InboundEvent::new("s", "e1", "hang")).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.trigger();
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), runtime.run(source))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.received, 1);
        assert_eq!(stats.completed, 0);
        assert!(runtime.container().pipeline.is_shut_down());
        drop(tx);
    }

    #[tokio::test]
    async fn test_runtime_is_single_use() {
        let provider = Arc::new(EchoProvider::new(Duration::ZERO, Duration::ZERO));
        let runtime = SessionRuntime::new(config(3), provider).unwrap();

        let (tx, source) = ChannelEventSource::new(4);
        drop(tx);
        runtime.run(source).await.unwrap();
        assert!(runtime.container().pipeline.is_shut_down());

        // Redeliveries after the stores are gone must not slip through.
        let (tx, source) = ChannelEventSource::new(4);
        for _ in 0..3 {
            tx.send(InboundEvent::new("s", "same-id", "again")).await.unwrap();
        }
        drop(tx);
        assert_eq!(
            runtime.run(source).await.unwrap_err(),
            RuntimeError::AlreadyStarted
        );
        assert_eq!(runtime.container().pipeline.stats().received, 0);
    }
}
