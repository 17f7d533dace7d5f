//! Enrichment client: the Visionati description API plus the two-tier
//! cache layering in front of it.
//!
//! [`VisionatiClient`] performs one network round-trip per image URL and
//! normalizes the service's heterogeneous payload shapes into a single
//! [`EnrichmentResponse`]. [`Enricher`] layers the session and persistent
//! caches over any [`DescriptionBackend`] and applies retry/backoff.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex as AsyncMutex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{ResultCache, SessionCache};
use crate::retry::{RetryConfig, with_retry};
use crate::telemetry;
use crate::types::EnrichmentResponse;
use crate::{AltgenError, EnrichConfig, Result};

/// Default base URL for the Visionati fetch endpoint.
const DEFAULT_BASE_URL: &str = "https://api.visionati.com";

/// Separator the service is prompted to put between description and
/// filename in its reply text.
const FIELD_DELIMITER: char = '|';

/// Maximum length of a sanitized filename (extension-less).
const MAX_FILENAME_LEN: usize = 100;

/// Maximum length of the body sample carried in an
/// [`AltgenError::UnrecognizedResponse`].
const ERROR_SAMPLE_LEN: usize = 200;

/// A service that produces a description and filename for an image URL.
///
/// The one seam the orchestrator depends on — tests substitute stub
/// implementations to exercise fallback paths without a network.
#[async_trait]
pub trait DescriptionBackend: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Describe a single image. One network round-trip, no caching and no
    /// retries — those belong to [`Enricher`].
    async fn describe(&self, url: &str) -> Result<EnrichmentResponse>;
}

/// Client for the Visionati description-generation API.
#[derive(Clone)]
pub struct VisionatiClient {
    api_key: String,
    http: Client,
    base_url: String,
    backend: String,
    language: String,
    prompt: String,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    url: &'a str,
    backend: &'a str,
    feature: [&'a str; 1],
    #[serde(skip_serializing_if = "str::is_empty")]
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    language: &'a str,
}

impl VisionatiClient {
    /// Create a client from the pipeline configuration.
    ///
    /// Fails when no API key is configured.
    pub fn new(config: &EnrichConfig) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(config: &EnrichConfig, base_url: impl Into<String>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AltgenError::Configuration("enrichment requires an API key".into()))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AltgenError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            http,
            base_url: base_url.into(),
            backend: config.backend.clone(),
            language: config.language.clone(),
            prompt: config.prompt.clone(),
        })
    }

    /// Check response status and map to the appropriate error.
    fn handle_response_errors(&self, response: &reqwest::Response) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 | 403 => Err(AltgenError::AuthenticationFailed),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(AltgenError::RateLimited { retry_after })
            }
            code => Err(AltgenError::Api {
                status: code,
                message: format!("Visionati API error: {status}"),
            }),
        }
    }
}

#[async_trait]
impl DescriptionBackend for VisionatiClient {
    fn name(&self) -> &str {
        "visionati"
    }

    async fn describe(&self, url: &str) -> Result<EnrichmentResponse> {
        let endpoint = format!("{}/api/fetch", self.base_url);

        let response = self
            .http
            .post(&endpoint)
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&FetchRequest {
                url,
                backend: &self.backend,
                feature: ["descriptions"],
                prompt: &self.prompt,
                language: &self.language,
            })
            .send()
            .await
            .map_err(|e| AltgenError::Http(e.to_string()))?;

        self.handle_response_errors(&response)?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AltgenError::Http(e.to_string()))?;

        let text = extract_description(&payload)?;
        let credits_used = extract_credits(&payload);
        let (description, filename) = split_description(&text);

        Ok(EnrichmentResponse {
            description,
            filename,
            credits_used,
            error: None,
        })
    }
}

// ============================================================================
// Response-shape normalization
// ============================================================================

/// Pull the description text out of an upstream payload.
///
/// The service has shipped at least four shapes over time; matchers are
/// tried in order and the first match wins. Exhausting all of them is an
/// explicit error carrying the keys seen and a body sample — never a
/// silently empty description.
fn extract_description(payload: &Value) -> Result<String> {
    let matchers: [fn(&Value) -> Option<&str>; 5] = [
        match_nested_assets,
        match_flat_result,
        match_flat_description,
        match_flat_text,
        match_bare_string,
    ];

    for matcher in matchers {
        if let Some(text) = matcher(payload) {
            let text = text.trim();
            if !text.is_empty() {
                return Ok(text.to_string());
            }
        }
    }

    let keys = match payload.as_object() {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        None => String::new(),
    };
    let mut sample = payload.to_string();
    truncate_at_char_boundary(&mut sample, ERROR_SAMPLE_LEN);
    Err(AltgenError::UnrecognizedResponse { keys, sample })
}

/// `{"all": {"assets": [{"descriptions": [{"description": "..."}]}]}}` or
/// the same without the `all` wrapper.
fn match_nested_assets(payload: &Value) -> Option<&str> {
    let root = payload.get("all").unwrap_or(payload);
    let first = root.get("assets")?.as_array()?.first()?;
    let description = first.get("descriptions")?.as_array()?.first()?;
    description
        .get("description")
        .and_then(Value::as_str)
        .or_else(|| description.as_str())
}

fn match_flat_result(payload: &Value) -> Option<&str> {
    payload.get("result")?.as_str()
}

fn match_flat_description(payload: &Value) -> Option<&str> {
    payload.get("description")?.as_str()
}

fn match_flat_text(payload: &Value) -> Option<&str> {
    payload.get("text")?.as_str()
}

fn match_bare_string(payload: &Value) -> Option<&str> {
    payload.as_str()
}

/// Credits charged for the call, probed from `credits_paid` then `credits`.
/// Absent both, 0.
fn extract_credits(payload: &Value) -> u64 {
    payload
        .get("credits_paid")
        .or_else(|| payload.get("credits"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

// ============================================================================
// Text handling
// ============================================================================

/// Split the reply text into `(description, filename)`.
///
/// The two pieces are delimited by [`FIELD_DELIMITER`]; with no delimiter
/// the whole text is the description and the filename is derived from it.
/// The filename side is always sanitized before use.
pub fn split_description(text: &str) -> (String, String) {
    match text.split_once(FIELD_DELIMITER) {
        Some((description, filename)) => {
            let description = description.trim().to_string();
            let filename = sanitize_filename(filename.trim());
            if filename.is_empty() {
                let derived = slugify(&description);
                (description, derived)
            } else {
                (description, filename)
            }
        }
        None => {
            let description = text.trim().to_string();
            let filename = slugify(&description);
            (description, filename)
        }
    }
}

/// Derive a filename from free text: lowercased, non-alphanumeric runs
/// collapsed to single hyphens, trimmed, length-capped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_sep = true; // suppress leading separator
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, 'ä' | 'ö' | 'ü' | 'ß') {
            slug.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('-');
            last_was_sep = true;
        }
    }
    truncate_at_char_boundary(&mut slug, MAX_FILENAME_LEN);
    // Truncation can expose a trailing separator.
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Sanitize a filename candidate: extension stripped, lowercased, restricted
/// to letters, digits, `äöüß` and hyphens, separator runs collapsed,
/// length-capped.
pub fn sanitize_filename(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        // Only treat short trailing segments as extensions.
        Some((stem, ext)) if ext.len() <= 5 && !stem.is_empty() => stem,
        _ => name,
    };
    slugify(stem)
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

// ============================================================================
// Enricher — cache layering + retry over a backend
// ============================================================================

/// Two-tier-cached, retry-capable front of a [`DescriptionBackend`].
///
/// Lookup order for [`generate_alt_text()`](Enricher::generate_alt_text):
/// session cache, persistent cache (hit → zero credits, mirrored into the
/// session tier), then the network via the retry policy. Both tiers key on
/// the same configuration fingerprint. Concurrent calls for the same URL
/// coalesce onto one in-flight lookup instead of each paying credits.
pub struct Enricher {
    backend: Arc<dyn DescriptionBackend>,
    session: SessionCache,
    store: Arc<Mutex<ResultCache>>,
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    retry: RetryConfig,
    fingerprint: String,
}

impl Enricher {
    /// Build an enricher over `backend`, loading the persistent cache from
    /// the configured path.
    pub fn new(config: &EnrichConfig, backend: Arc<dyn DescriptionBackend>) -> Self {
        Self {
            backend,
            session: SessionCache::new(),
            store: Arc::new(Mutex::new(ResultCache::load(config))),
            inflight: Mutex::new(HashMap::new()),
            retry: config.retry.clone(),
            fingerprint: config.fingerprint(),
        }
    }

    /// Produce alt text and a filename for one image URL.
    ///
    /// Cache hits cost no credits and no network I/O. A network failure
    /// after all retries surfaces as [`AltgenError::Enrichment`] carrying
    /// the URL and the original message.
    pub async fn generate_alt_text(&self, url: &str) -> Result<EnrichmentResponse> {
        if let Some(hit) = self.session.get(url, &self.fingerprint) {
            return Ok(hit);
        }

        // Coalesce duplicates: concurrent callers for the same URL queue on
        // a per-URL gate, and every caller after the first resolves from the
        // session memo the winner populated.
        let gate = {
            let mut inflight = self.inflight.lock().expect("inflight map lock poisoned");
            inflight.entry(url.to_string()).or_default().clone()
        };
        let _guard = gate.lock().await;

        if let Some(hit) = self.session.get(url, &self.fingerprint) {
            return Ok(hit);
        }

        let result = self.lookup_or_describe(url).await;

        self.inflight
            .lock()
            .expect("inflight map lock poisoned")
            .remove(url);

        result
    }

    /// Persistent-cache lookup, then the network. Callers hold the per-URL
    /// gate.
    async fn lookup_or_describe(&self, url: &str) -> Result<EnrichmentResponse> {
        let stored = {
            let mut store = self.store.lock().expect("result cache lock poisoned");
            store.get(url, &self.fingerprint)
        };
        if let Some(entry) = stored {
            debug!(url, "persistent cache hit");
            let response = EnrichmentResponse {
                description: entry.alt_text,
                filename: entry.filename,
                credits_used: 0, // no credits spent on a cache hit
                error: None,
            };
            self.session
                .insert(url, &self.fingerprint, response.clone());
            return Ok(response);
        }

        let started = std::time::Instant::now();
        let outcome = with_retry(&self.retry, "enrich", url, || self.backend.describe(url)).await;
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => "enrich")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "operation" => "enrich",
            "status" => if outcome.is_ok() { "ok" } else { "error" },
        )
        .increment(1);

        let response = outcome.map_err(|e| AltgenError::Enrichment {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        {
            let mut store = self.store.lock().expect("result cache lock poisoned");
            store.set(url, &response, &self.fingerprint);
        }
        self.session
            .insert(url, &self.fingerprint, response.clone());

        Ok(response)
    }

    /// Flush the persistent tier to disk (no-op when nothing changed).
    pub fn persist(&self) {
        self.store
            .lock()
            .expect("result cache lock poisoned")
            .save();
    }

    /// Clear the session tier for an independent run.
    pub fn clear_session(&self) {
        self.session.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_assets_shape() {
        let payload = json!({
            "all": {
                "assets": [
                    {"descriptions": [{"description": "A red fox | red-fox"}]}
                ]
            },
            "credits_paid": 3
        });
        assert_eq!(
            extract_description(&payload).unwrap(),
            "A red fox | red-fox"
        );
        assert_eq!(extract_credits(&payload), 3);
    }

    #[test]
    fn extracts_flat_result_shape() {
        let payload = json!({"result": "a mountain lake"});
        assert_eq!(extract_description(&payload).unwrap(), "a mountain lake");
    }

    #[test]
    fn extracts_flat_description_shape() {
        let payload = json!({"description": "a mountain lake"});
        assert_eq!(extract_description(&payload).unwrap(), "a mountain lake");
    }

    #[test]
    fn extracts_flat_text_shape() {
        let payload = json!({"text": "a mountain lake"});
        assert_eq!(extract_description(&payload).unwrap(), "a mountain lake");
    }

    #[test]
    fn extracts_bare_string_shape() {
        let payload = json!("a mountain lake");
        assert_eq!(extract_description(&payload).unwrap(), "a mountain lake");
    }

    #[test]
    fn unrecognized_shape_fails_closed() {
        let payload = json!({"unexpectedField": 1});
        let err = extract_description(&payload).unwrap_err();
        match err {
            AltgenError::UnrecognizedResponse { keys, sample } => {
                assert!(keys.contains("unexpectedField"));
                assert!(!sample.is_empty());
            }
            other => panic!("expected UnrecognizedResponse, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_shape_sample_respects_char_boundaries() {
        // Multibyte text must not land the truncation mid-character.
        let payload = json!({"unexpectedField": format!("a{}", "ü".repeat(120))});
        let err = extract_description(&payload).unwrap_err();
        match err {
            AltgenError::UnrecognizedResponse { sample, .. } => {
                assert!(sample.len() <= ERROR_SAMPLE_LEN);
                assert!(!sample.is_empty());
            }
            other => panic!("expected UnrecognizedResponse, got {other:?}"),
        }
    }

    #[test]
    fn empty_description_is_not_a_match() {
        // A matching key with empty content must fall through, not return "".
        let payload = json!({"result": "   "});
        assert!(extract_description(&payload).is_err());
    }

    #[test]
    fn split_with_delimiter() {
        let (description, filename) = split_description("A red fox in snow | red-fox-snow");
        assert_eq!(description, "A red fox in snow");
        assert_eq!(filename, "red-fox-snow");
    }

    #[test]
    fn split_without_delimiter_derives_filename() {
        let (description, filename) = split_description("A red fox in snow");
        assert_eq!(description, "A red fox in snow");
        assert_eq!(filename, "a-red-fox-in-snow");
    }

    #[test]
    fn slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("Grüne Smoothies & Co."), "grüne-smoothies-co");
    }

    #[test]
    fn slugify_caps_length() {
        let long = "a".repeat(300);
        assert_eq!(slugify(&long).len(), 100);
    }

    #[test]
    fn sanitize_strips_extension() {
        assert_eq!(sanitize_filename("My Photo.JPEG"), "my-photo");
        assert_eq!(sanitize_filename("no-extension"), "no-extension");
    }

    #[test]
    fn sanitize_ignores_long_fake_extension() {
        // "sentence.with a dot" — the tail is not an extension.
        assert_eq!(
            sanitize_filename("sentence.with a longer tail"),
            "sentence-with-a-longer-tail"
        );
    }
}
