//! Telemetry metric name constants.
//!
//! Centralised metric names for altgen operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `altgen_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — pipeline step: "enrich" or "download"
//! - `status` — outcome: "ok" or "error"
//! - `tier` — cache tier: "session" or "store"

/// Total enrichment/download requests dispatched.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "altgen_requests_total";

/// Request duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "altgen_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "altgen_retries_total";

/// Total cache hits.
///
/// Labels: `tier` ("session" | "store").
pub const CACHE_HITS_TOTAL: &str = "altgen_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier` ("session" | "store").
pub const CACHE_MISSES_TOTAL: &str = "altgen_cache_misses_total";

/// Total enrichment credits spent upstream.
pub const CREDITS_TOTAL: &str = "altgen_credits_total";

/// Total images run through the processor.
///
/// Labels: `status` ("ok" | "error").
pub const IMAGES_PROCESSED_TOTAL: &str = "altgen_images_processed_total";

/// Total image bytes downloaded.
pub const DOWNLOAD_BYTES_TOTAL: &str = "altgen_download_bytes_total";
