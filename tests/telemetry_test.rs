//! Metric emission checks with a debugging recorder.

use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use altgen::types::EnrichmentResponse;
use altgen::{SessionCache, telemetry};

fn response() -> EnrichmentResponse {
    EnrichmentResponse {
        description: "d".to_string(),
        filename: "f".to_string(),
        credits_used: 0,
        error: None,
    }
}

#[test]
fn session_cache_emits_hit_and_miss_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache = SessionCache::new();
        assert!(cache.get("u", "fp").is_none());
        cache.insert("u", "fp", response());
        assert!(cache.get("u", "fp").is_some());
    });

    let snapshot = snapshotter.snapshot().into_vec();
    let counter = |name: &str| {
        snapshot.iter().find_map(|(key, _, _, value)| {
            (key.key().name() == name).then(|| match value {
                DebugValue::Counter(v) => *v,
                other => panic!("expected counter for {name}, got {other:?}"),
            })
        })
    };

    assert_eq!(counter(telemetry::CACHE_HITS_TOTAL), Some(1));
    assert_eq!(counter(telemetry::CACHE_MISSES_TOTAL), Some(1));

    let (hit_key, ..) = snapshot
        .iter()
        .find(|(key, ..)| key.key().name() == telemetry::CACHE_HITS_TOTAL)
        .unwrap();
    assert!(
        hit_key
            .key()
            .labels()
            .any(|label| label.key() == "tier" && label.value() == "session")
    );
}
