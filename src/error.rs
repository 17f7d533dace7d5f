//! Altgen error types

use std::time::Duration;

/// Altgen error types
#[derive(Debug, thiserror::Error)]
pub enum AltgenError {
    // Network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream response matched none of the tolerated payload shapes.
    ///
    /// Carries the top-level keys seen and a truncated body sample so the
    /// failure is diagnosable without re-running against the live API.
    #[error("unrecognized response shape (keys: [{keys}]): {sample}")]
    UnrecognizedResponse { keys: String, sample: String },

    /// Enrichment failed after all retries, wrapped with the image URL.
    #[error("enrichment failed for {url}: {message}")]
    Enrichment { url: String, message: String },

    /// Image download failed. Hard failure for that one image — there is
    /// no fallback for missing bytes.
    #[error("download failed for {url}: {message}")]
    Download { url: String, message: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AltgenError {
    /// Whether this error is worth retrying.
    ///
    /// Transport failures, rate limits, and server-side 5xx (plus 408/429)
    /// are transient. Authentication and shape errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            AltgenError::Http(_) => true,
            AltgenError::RateLimited { .. } => true,
            AltgenError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Retry-after hint from a rate-limit response, if the server sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AltgenError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for altgen operations
pub type Result<T> = std::result::Result<T, AltgenError>;
