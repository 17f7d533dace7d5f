//! Run-scoped in-memory enrichment memo.
//!
//! [`SessionCache`] de-duplicates enrichment work within a single run:
//! the same URL asked twice in one process costs one call. Keyed on
//! `hash(url, fingerprint)` — the *same* fingerprint the persistent tier
//! stores, so both tiers invalidate through one function.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use moka::sync::Cache;

use crate::telemetry;
use crate::types::EnrichmentResponse;

/// Default maximum number of memoized responses per run.
const DEFAULT_SESSION_CACHE_MAX: u64 = 10_000;

/// In-memory cache of enrichment responses for the current run.
///
/// Thread-safe (moka handles concurrent access internally). Cleared at the
/// start of every independent run via [`clear()`](SessionCache::clear).
pub struct SessionCache {
    cache: Cache<u64, EnrichmentResponse>,
}

impl SessionCache {
    /// Create an empty session cache with the default capacity.
    pub fn new() -> Self {
        Self {
            cache: Cache::new(DEFAULT_SESSION_CACHE_MAX),
        }
    }

    /// Look up a memoized response. Emits cache hit/miss metrics.
    pub fn get(&self, url: &str, fingerprint: &str) -> Option<EnrichmentResponse> {
        match self.cache.get(&session_key(url, fingerprint)) {
            Some(response) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "session").increment(1);
                Some(response)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "session").increment(1);
                None
            }
        }
    }

    /// Memoize a response for the rest of the run.
    pub fn insert(&self, url: &str, fingerprint: &str, response: EnrichmentResponse) {
        self.cache.insert(session_key(url, fingerprint), response);
    }

    /// Evict everything, readying the cache for an independent run.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute a cache key from `(url, fingerprint)`.
///
/// Uses `DefaultHasher` (SipHash) — deterministic within a process lifetime,
/// which is sufficient for a run-scoped cache.
fn session_key(url: &str, fingerprint: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    fingerprint.hash(&mut hasher);
    hasher.finish()
}
