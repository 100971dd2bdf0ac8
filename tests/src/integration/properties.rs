//! # Property Tests
//!
//! Randomised checks of the core invariants against simple models:
//!
//! - The expiring store never returns a value past its deadline
//! - The deduplicator never grows past its capacity and flags every repeat
//!   that is still inside the window
//! - The serializer preserves per-key submission order for any interleaving

#[cfg(test)]
mod tests {
    use cadence_core::{DedupConfig, Deduplicator, ExpiringStore, KeySerializer, ManualTimeSource};
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    const KEYS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Every read agrees with a map of (value, deadline) pairs.
        #[test]
        fn store_matches_deadline_model(
            ops in prop::collection::vec((0usize..4, 1u64..50, 0u64..60), 1..80)
        ) {
            let clock = Arc::new(ManualTimeSource::new(1_000));
            let store = ExpiringStore::with_time_source(Duration::from_millis(10), clock.clone());
            let mut model: HashMap<&str, (usize, u64)> = HashMap::new();
            let mut now = 1_000u64;

            for (step, (key, ttl, advance)) in ops.into_iter().enumerate() {
                let key = KEYS[key];
                store.set_with_ttl(key, step, Duration::from_millis(ttl));
                model.insert(key, (step, now + ttl));

                clock.advance(advance);
                now += advance;

                for probe in KEYS {
                    let expected = model
                        .get(probe)
                        .filter(|(_, deadline)| now <= *deadline)
                        .map(|(value, _)| *value);
                    prop_assert_eq!(store.get(probe), expected);
                }
            }
        }

        /// Capacity holds and in-window repeats are always caught.
        #[test]
        fn dedup_bounded_and_catches_repeats(
            ids in prop::collection::vec(0u32..200, 1..400),
            max_entries in 1usize..60,
        ) {
            let clock = Arc::new(ManualTimeSource::new(0));
            let dedup = Deduplicator::with_time_source(
                &DedupConfig {
                    ttl_ms: 60_000,
                    max_entries,
                    ..DedupConfig::default()
                },
                clock,
            );

            let mut first_seen = std::collections::HashSet::new();
            for id in ids {
                let id = format!("event-{id}");
                let duplicate = dedup.check_and_mark(&id);
                if first_seen.insert(id.clone()) {
                    prop_assert!(!duplicate, "fresh id {} reported as duplicate", id);
                }
                prop_assert!(dedup.len() <= max_entries);
                // A just-marked id survives until a later insert evicts it.
                prop_assert!(dedup.is_duplicate(&id));
            }
        }

        /// Each key observes its tasks in the order they were submitted.
        #[test]
        fn serializer_preserves_per_key_order(
            submissions in prop::collection::vec(0usize..4, 1..60)
        ) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let observed = runtime.block_on(async {
                let serializer = KeySerializer::new();
                let log: Arc<Mutex<HashMap<usize, Vec<usize>>>> = Arc::default();

                let handles: Vec<_> = submissions
                    .iter()
                    .enumerate()
                    .map(|(seq, &key)| {
                        let log = Arc::clone(&log);
                        serializer.submit(KEYS[key], move || async move {
                            tokio::task::yield_now().await;
                            log.lock().entry(key).or_default().push(seq);
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }

                let log = log.lock().clone();
                log
            });

            for (key, order) in observed {
                let expected: Vec<usize> = submissions
                    .iter()
                    .enumerate()
                    .filter(|(_, &k)| k == key)
                    .map(|(seq, _)| seq)
                    .collect();
                prop_assert_eq!(order, expected);
            }
        }
    }
}
