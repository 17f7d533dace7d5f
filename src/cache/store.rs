//! Persistent, TTL-bounded result cache.
//!
//! [`ResultCache`] maps an image URL to a previously computed enrichment
//! result, shared across runs so the same image under the same configuration
//! never pays enrichment credits twice.
//!
//! # Persistence model
//!
//! Whole-file JSON: the store is read once at construction, mutated in
//! memory, and flushed on explicit [`save()`](ResultCache::save) calls via
//! temp-file + atomic rename. A dirty flag gates unnecessary writes. The
//! process model guarantees a single writer, so no file locking exists.
//!
//! Entry timestamps are persisted as RFC-3339 strings rather than a typed
//! field — a corrupt value still deserializes and can then be counted and
//! evicted by [`prune()`](ResultCache::prune) instead of poisoning the file.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::EnrichConfig;
use crate::telemetry;
use crate::types::EnrichmentResponse;

/// On-disk format version. Bumped on breaking schema changes; a mismatch
/// at load time discards all persisted entries.
pub const CACHE_FORMAT_VERSION: &str = "1.0";

/// One enrichment result persisted for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Human-readable alt text.
    pub alt_text: String,
    /// SEO-safe filename, extension-less.
    pub filename: String,
    /// Credits the original call cost.
    pub credits_used: u64,
    /// RFC-3339 instant of creation.
    pub timestamp: String,
    /// Hex digest of the enrichment configuration that produced this entry.
    pub config_hash: String,
}

impl CacheEntry {
    /// Age of this entry, or `None` when the timestamp does not parse.
    fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let ts = DateTime::parse_from_rfc3339(&self.timestamp).ok()?;
        (now - ts.with_timezone(&Utc)).to_std().ok()
    }
}

/// The root persisted structure: format version plus URL-keyed entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStore {
    /// Format version string, compared against [`CACHE_FORMAT_VERSION`].
    pub version: String,
    /// Legacy store-level digest. Invalidation is per entry; this field is
    /// kept (empty) so the file shape stays compatible with older readers.
    #[serde(default)]
    pub config_hash: String,
    /// Mapping from image URL to its cached result.
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    fn empty() -> Self {
        Self {
            version: CACHE_FORMAT_VERSION.to_string(),
            config_hash: String::new(),
            entries: HashMap::new(),
        }
    }
}

/// Durable cache of enrichment results keyed by image URL.
///
/// Entries are valid for reuse only while their `config_hash` equals the
/// digest of the current enrichment configuration and their age is within
/// the TTL. Expired entries are evicted lazily during lookups ("pull-based")
/// and in bulk by [`prune()`](ResultCache::prune).
pub struct ResultCache {
    path: PathBuf,
    enabled: bool,
    ttl: Duration,
    store: CacheStore,
    dirty: bool,
}

impl ResultCache {
    /// Load the cache from the configured path.
    ///
    /// Never fails: a missing file initializes an empty store, unparsable
    /// content is logged and reinitialized, and a format-version mismatch
    /// clears all entries. Expired entries are pruned as a side effect of
    /// a successful load.
    pub fn load(config: &EnrichConfig) -> Self {
        let mut cache = Self {
            path: config.cache_path.clone(),
            enabled: config.cache_enabled,
            ttl: config.cache_ttl(),
            store: CacheStore::empty(),
            dirty: false,
        };

        if !cache.enabled {
            return cache;
        }

        match fs::read_to_string(&cache.path) {
            Ok(raw) => match serde_json::from_str::<CacheStore>(&raw) {
                Ok(store) if store.version == CACHE_FORMAT_VERSION => {
                    debug!(
                        path = %cache.path.display(),
                        entries = store.entries.len(),
                        "loaded result cache"
                    );
                    cache.store = store;
                    cache.prune();
                }
                Ok(store) => {
                    info!(
                        found = store.version,
                        expected = CACHE_FORMAT_VERSION,
                        "cache format version mismatch, discarding entries"
                    );
                    cache.dirty = true;
                }
                Err(e) => {
                    warn!(
                        path = %cache.path.display(),
                        error = %e,
                        "unparsable cache file, reinitializing"
                    );
                    cache.dirty = true;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                cache.dirty = true;
            }
            Err(e) => {
                warn!(
                    path = %cache.path.display(),
                    error = %e,
                    "failed to read cache file, reinitializing"
                );
                cache.dirty = true;
            }
        }

        cache
    }

    /// Look up the entry for `url` under the given config fingerprint.
    ///
    /// Returns the entry only if present, fingerprint-matching, and within
    /// the TTL. An expired (or timestamp-corrupt) entry is evicted as part
    /// of the lookup. A fingerprint mismatch is treated as absent *without*
    /// eviction — the entry may become valid again under a future
    /// configuration.
    pub fn get(&mut self, url: &str, fingerprint: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }

        let Some(entry) = self.store.entries.get(url) else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "store").increment(1);
            return None;
        };

        if entry.config_hash != fingerprint {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "store").increment(1);
            return None;
        }

        let fresh = entry
            .age(Utc::now())
            .is_some_and(|age| age <= self.ttl);
        if !fresh {
            self.store.entries.remove(url);
            self.dirty = true;
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "store").increment(1);
            return None;
        }

        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "store").increment(1);
        self.store.entries.get(url).cloned()
    }

    /// Write (or overwrite) the entry for `url`, stamping the current
    /// instant and fingerprint. Does not flush to disk.
    pub fn set(&mut self, url: &str, response: &EnrichmentResponse, fingerprint: &str) {
        if !self.enabled {
            return;
        }
        self.store.entries.insert(
            url.to_string(),
            CacheEntry {
                alt_text: response.description.clone(),
                filename: response.filename.clone(),
                credits_used: response.credits_used,
                timestamp: Utc::now().to_rfc3339(),
                config_hash: fingerprint.to_string(),
            },
        );
        self.dirty = true;
    }

    /// Whether a valid entry exists for `url` under `fingerprint`.
    pub fn has(&mut self, url: &str, fingerprint: &str) -> bool {
        self.get(url, fingerprint).is_some()
    }

    /// Remove all entries whose age exceeds the TTL, plus any whose
    /// timestamp does not parse (corrupt, evicted rather than kept
    /// indefinitely). Persists immediately if anything changed.
    pub fn prune(&mut self) {
        if !self.enabled {
            return;
        }

        let now = Utc::now();
        let ttl = self.ttl;
        let before = self.store.entries.len();
        let mut expired = 0usize;
        let mut invalid = 0usize;

        self.store.entries.retain(|_, entry| match entry.age(now) {
            Some(age) if age <= ttl => true,
            Some(_) => {
                expired += 1;
                false
            }
            None => {
                invalid += 1;
                false
            }
        });

        if expired > 0 || invalid > 0 {
            info!(
                before,
                expired, invalid, "pruned result cache"
            );
            self.dirty = true;
            self.save();
        }
    }

    /// Flush the store to disk if caching is enabled and anything changed.
    ///
    /// Serializes the whole store, writes to a temporary sibling path, then
    /// atomically renames over the real path so a crash mid-write never
    /// leaves a truncated file. I/O failures are logged and leave the
    /// in-memory state (and dirty flag) untouched so a later save can retry.
    pub fn save(&mut self) {
        if !self.enabled || !self.dirty {
            return;
        }

        let serialized = match serde_json::to_string_pretty(&self.store) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize result cache");
                return;
            }
        };

        let tmp = self.path.with_extension("tmp");
        if let Err(e) = fs::write(&tmp, serialized) {
            warn!(path = %tmp.display(), error = %e, "failed to write cache temp file");
            return;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to replace cache file");
            let _ = fs::remove_file(&tmp);
            return;
        }

        debug!(
            path = %self.path.display(),
            entries = self.store.entries.len(),
            "saved result cache"
        );
        self.dirty = false;
    }

    /// Discard all entries and persist immediately.
    pub fn clear(&mut self) {
        self.store.entries.clear();
        self.dirty = true;
        self.save();
    }

    /// Snapshot of the in-memory store, for diagnostics and tests.
    pub fn export(&self) -> CacheStore {
        self.store.clone()
    }

    /// Replace the in-memory store with `store`.
    ///
    /// Accepted only when the store's version matches the running format;
    /// mismatches are silently rejected.
    pub fn import(&mut self, store: CacheStore) {
        if store.version != CACHE_FORMAT_VERSION {
            debug!(
                found = store.version,
                expected = CACHE_FORMAT_VERSION,
                "rejecting cache import with mismatched version"
            );
            return;
        }
        self.store = store;
        self.dirty = true;
    }

    /// Number of entries currently held, valid or not.
    pub fn len(&self) -> usize {
        self.store.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.entries.is_empty()
    }
}
