//! Pipeline configuration and the enrichment fingerprint.
//!
//! [`EnrichConfig`] carries every knob the pipeline accepts, all with
//! documented defaults so omission never produces undefined behaviour.
//!
//! The [`fingerprint()`](EnrichConfig::fingerprint) digest covers only the
//! fields that change enrichment *output* (`backend`, `language`, `prompt`).
//! Both cache tiers key on this one function — timeouts, concurrency limits
//! and the like never invalidate cached results.

use std::path::PathBuf;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::retry::RetryConfig;

/// Default description backend requested from the enrichment service.
pub const DEFAULT_BACKEND: &str = "claude";

/// Default description language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default on-disk cache file, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = ".visionati-cache.json";

/// Configuration for the enrichment pipeline.
///
/// ```rust
/// # use altgen::EnrichConfig;
/// # use std::time::Duration;
/// let config = EnrichConfig::new()
///     .api_key("v-your-key")
///     .backend("gemini")
///     .language("de")
///     .max_concurrent(5)
///     .cache_ttl_days(7);
/// ```
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// API key for the enrichment service. Without one, enrichment is
    /// disabled and the pipeline runs in fallback-only mode.
    pub api_key: Option<String>,
    /// Master switch for enrichment. Default: true (still requires a key).
    pub enabled: bool,
    /// Description backend. Default: "claude".
    pub backend: String,
    /// Target language for descriptions. Default: "en".
    pub language: String,
    /// Custom prompt sent to the service. Default: empty.
    pub prompt: String,
    /// Per-request timeout for enrichment and downloads. Default: 30s.
    pub timeout: Duration,
    /// Maximum simultaneously in-flight enrichment calls. Default: 3.
    pub max_concurrent: usize,
    /// Retry policy for transient enrichment failures.
    pub retry: RetryConfig,
    /// Whether the persistent result cache is used. Default: true.
    pub cache_enabled: bool,
    /// Path of the persistent cache file. Default: `.visionati-cache.json`.
    pub cache_path: PathBuf,
    /// Time-to-live for cached results, in days. Default: 30.
    pub cache_ttl_days: u64,
    /// Pause between batches, to respect upstream rate limits. Default: 500ms.
    pub batch_delay: Duration,
    /// Base URL prepended to relative image URLs. Default: none (relative
    /// URLs fail the download for that image).
    pub image_base_url: Option<String>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: true,
            backend: DEFAULT_BACKEND.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            prompt: String::new(),
            timeout: Duration::from_secs(30),
            max_concurrent: 3,
            retry: RetryConfig::default(),
            cache_enabled: true,
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
            cache_ttl_days: 30,
            batch_delay: Duration::from_millis(500),
            image_base_url: None,
        }
    }
}

impl EnrichConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enrichment service API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Enable or disable enrichment.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the description backend.
    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Set the description language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set a custom prompt.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of concurrent enrichment calls.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable the persistent result cache.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the persistent cache file path.
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Set the cache TTL in days.
    pub fn cache_ttl_days(mut self, days: u64) -> Self {
        self.cache_ttl_days = days;
        self
    }

    /// Set the pause between batches.
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Set the base URL for resolving relative image URLs.
    pub fn image_base_url(mut self, base: impl Into<String>) -> Self {
        self.image_base_url = Some(base.into());
        self
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_days * 24 * 3600)
    }

    /// Hex SHA-256 digest of the enrichment-relevant configuration.
    ///
    /// Hashes a canonical JSON encoding of `{backend, language, prompt}`,
    /// substituting the documented defaults for empty fields. Stable across
    /// processes, so persisted entries survive restarts as long as these
    /// three fields are unchanged.
    pub fn fingerprint(&self) -> String {
        let backend = if self.backend.is_empty() {
            DEFAULT_BACKEND
        } else {
            &self.backend
        };
        let language = if self.language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            &self.language
        };
        // serde_json maps are sorted by key, so this encoding is canonical.
        let canonical = serde_json::json!({
            "backend": backend,
            "language": language,
            "prompt": self.prompt,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
