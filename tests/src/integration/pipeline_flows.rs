//! # Pipeline Integration Flows
//!
//! Exercises the full event path of `SessionPipeline` with many sessions at
//! once:
//!
//! 1. **Ordering**: events of one session run in arrival order, never overlapping
//! 2. **Parallelism**: distinct sessions proceed concurrently
//! 3. **Provider cap**: calls routed through the work queue never exceed the limit
//! 4. **Dedup**: redelivered events run once
//! 5. **Cooldown**: spacing is per session, not global
//! 6. **Teardown**: idle sessions leave no serializer state; shutdown is safe

#[cfg(test)]
mod tests {
    use cadence_core::{
        CoreConfig, Dispatch, HandlerOutcome, InboundEvent, SessionPipeline, TaskHandle,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn pipeline(window_ms: u64, concurrency: usize) -> SessionPipeline {
        let mut config = CoreConfig::default();
        config.cooldown.window_ms = window_ms;
        config.queue.concurrency_limit = concurrency;
        SessionPipeline::new(config).unwrap()
    }

    fn queued<T, E>(dispatch: Dispatch<T, E>) -> TaskHandle<HandlerOutcome<T, E>> {
        match dispatch {
            Dispatch::Queued(handle) => handle,
            Dispatch::Duplicate => panic!("event unexpectedly treated as duplicate"),
        }
    }

    /// Per-session bookkeeping shared with handlers.
    #[derive(Default)]
    struct Journal {
        processed: Mutex<HashMap<String, Vec<u32>>>,
        busy: Mutex<HashMap<String, bool>>,
        overlaps: AtomicUsize,
    }

    impl Journal {
        fn enter(&self, session: &str) {
            let mut busy = self.busy.lock();
            let slot = busy.entry(session.to_string()).or_default();
            if *slot {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *slot = true;
        }

        fn leave(&self, session: &str, seq: u32) {
            self.busy.lock().insert(session.to_string(), false);
            self.processed
                .lock()
                .entry(session.to_string())
                .or_default()
                .push(seq);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sessions_ordered_and_provider_capped() {
        const SESSIONS: u32 = 6;
        const EVENTS_PER_SESSION: u32 = 8;
        const LIMIT: usize = 2;

        let pipeline = pipeline(0, LIMIT);
        let journal = Arc::new(Journal::default());
        let provider_now = Arc::new(AtomicUsize::new(0));
        let provider_peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        // Interleave sessions the way a transport would deliver them.
        for seq in 0..EVENTS_PER_SESSION {
            for session in 0..SESSIONS {
                let key = format!("session-{session}");
                let event = InboundEvent::new(key.clone(), format!("{key}-{seq}"), "ping");

                let journal = Arc::clone(&journal);
                let queue = pipeline.work_queue().clone();
                let provider_now = Arc::clone(&provider_now);
                let provider_peak = Arc::clone(&provider_peak);

                handles.push(queued(pipeline.dispatch(event, move |event| async move {
                    journal.enter(&event.session_key);

                    let reply = queue
                        .submit(move || async move {
                            let now = provider_now.fetch_add(1, Ordering::SeqCst) + 1;
                            provider_peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(2)).await;
                            provider_now.fetch_sub(1, Ordering::SeqCst);
                            "pong"
                        })
                        .await
                        .map_err(|e| e.to_string())?;

                    journal.leave(&event.session_key, seq);
                    Ok::<_, String>(reply)
                })));
            }
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), HandlerOutcome::Completed("pong"));
        }

        assert_eq!(journal.overlaps.load(Ordering::SeqCst), 0);
        assert!(provider_peak.load(Ordering::SeqCst) <= LIMIT);

        let expected: Vec<u32> = (0..EVENTS_PER_SESSION).collect();
        let processed = journal.processed.lock();
        assert_eq!(processed.len(), SESSIONS as usize);
        for (session, order) in processed.iter() {
            assert_eq!(order, &expected, "out-of-order processing for {session}");
        }

        let stats = pipeline.stats();
        assert_eq!(stats.completed, u64::from(SESSIONS * EVENTS_PER_SESSION));
        assert_eq!(stats.duplicates, 0);
    }

    #[tokio::test]
    async fn test_redelivered_events_run_once() {
        let pipeline = pipeline(0, 3);
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        let mut duplicates = 0;
        for id in ["m1", "m2", "m1", "m3", "m2", "m1"] {
            let runs = Arc::clone(&runs);
            let event = InboundEvent::new("chat", id, "hello");
            match pipeline.dispatch(event, move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }) {
                Dispatch::Queued(handle) => handles.push(handle),
                Dispatch::Duplicate => duplicates += 1,
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(duplicates, 3);
        assert_eq!(pipeline.stats().dedup.duplicates, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_is_per_session() {
        let pipeline = pipeline(1_000, 3);
        let starts: Arc<Mutex<Vec<(String, tokio::time::Instant)>>> = Arc::default();

        let mut handles = Vec::new();
        for (session, id) in [("a", "a1"), ("a", "a2"), ("b", "b1")] {
            let starts = Arc::clone(&starts);
            handles.push(queued(pipeline.dispatch(
                InboundEvent::new(session, id, "x"),
                move |event| async move {
                    starts
                        .lock()
                        .push((event.event_id.clone(), tokio::time::Instant::now()));
                    Ok::<_, ()>(())
                },
            )));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let starts = starts.lock();
        let at = |id: &str| {
            starts
                .iter()
                .find(|(event_id, _)| event_id == id)
                .map(|(_, instant)| *instant)
                .unwrap()
        };
        assert!(at("a2") - at("a1") >= Duration::from_millis(1_000));
        // Session b never waited on session a.
        assert!(at("b1") <= at("a1") + Duration::from_millis(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_sessions_release_serializer_state() {
        let pipeline = pipeline(0, 3);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                queued(pipeline.dispatch(
                    InboundEvent::new(format!("s{}", i % 5), format!("e{i}"), "x"),
                    |_| async { Ok::<_, ()>(()) },
                ))
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for _ in 0..200 {
            if pipeline.serializer().active_keys() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(pipeline.serializer().active_keys(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_does_not_panic() {
        let pipeline = pipeline(0, 3);
        pipeline.start_sweepers().unwrap();
        pipeline.shutdown();

        let outcome = pipeline
            .process(InboundEvent::new("s", "late", "x"), |_| async {
                Ok::<_, ()>("still handled")
            })
            .await
            .unwrap();

        assert_eq!(outcome, Some(HandlerOutcome::Completed("still handled")));
        assert_eq!(pipeline.stats().cooldown_entries, 0);
    }
}
