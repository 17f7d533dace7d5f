//! Image byte fetching and URL/filename handling.
//!
//! Downloads are independent of enrichment: a download failure is the one
//! hard failure for an image (there is no fallback for missing bytes),
//! reported per-item by the orchestrator rather than thrown across the
//! batch.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;

use crate::{AltgenError, Result};

/// Extensions accepted as-is when extracting a filename from a URL.
const VALID_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

/// Fetches raw image bytes over HTTP.
#[derive(Clone)]
pub struct Downloader {
    http: Client,
    base_url: Option<String>,
}

impl Downloader {
    /// Create a downloader with the given per-request timeout and optional
    /// base URL for resolving relative image URLs.
    pub fn new(timeout: Duration, base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AltgenError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url })
    }

    /// Resolve a possibly protocol-less or relative URL to an absolute one.
    ///
    /// `//host/img.jpg` becomes `https://host/img.jpg`; a relative path is
    /// joined onto the configured base URL, or fails when no base URL is
    /// configured.
    pub fn normalize_url(&self, url: &str) -> Result<String> {
        if url.is_empty() {
            return Err(AltgenError::Download {
                url: url.to_string(),
                message: "empty image URL".to_string(),
            });
        }
        if let Some(rest) = url.strip_prefix("//") {
            return Ok(format!("https://{rest}"));
        }
        if url.starts_with("http") {
            return Ok(url.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}{}", base.trim_end_matches('/'), url)),
            None => Err(AltgenError::Download {
                url: url.to_string(),
                message: "relative URL without base URL".to_string(),
            }),
        }
    }

    /// Download the raw bytes for one image.
    ///
    /// Non-2xx responses and transport errors both map to
    /// [`AltgenError::Download`].
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let absolute = self.normalize_url(url)?;

        let response = self
            .http
            .get(&absolute)
            .send()
            .await
            .map_err(|e| AltgenError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AltgenError::Download {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AltgenError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

/// Extract a filename from an image URL.
///
/// Strips query/fragment, takes the last path segment, and appends `.jpg`
/// when the segment carries no recognized image extension. An unusable URL
/// yields a timestamped placeholder name.
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let filename = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");

    if filename.is_empty() || filename.contains(':') {
        // Nothing usable in the path (bare host or scheme remnant).
        return format!("image-{}.jpg", Utc::now().format("%Y%m%d-%H%M%S"));
    }

    let lower = filename.to_lowercase();
    if VALID_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        filename.to_string()
    } else {
        format!("{filename}.jpg")
    }
}

/// Extension of a filename (without the dot), when it carries a recognized
/// image extension.
pub fn extension_of(filename: &str) -> Option<&str> {
    let lower = filename.to_lowercase();
    VALID_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &filename[filename.len() - ext.len() + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader(base: Option<&str>) -> Downloader {
        Downloader::new(Duration::from_secs(5), base.map(String::from)).unwrap()
    }

    #[test]
    fn normalizes_protocol_relative_url() {
        let d = downloader(None);
        assert_eq!(
            d.normalize_url("//cdn.example.com/a.jpg").unwrap(),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn absolute_url_passes_through() {
        let d = downloader(None);
        assert_eq!(
            d.normalize_url("http://example.com/a.jpg").unwrap(),
            "http://example.com/a.jpg"
        );
    }

    #[test]
    fn relative_url_joins_base() {
        let d = downloader(Some("https://example.com/"));
        assert_eq!(
            d.normalize_url("/wp-content/a.jpg").unwrap(),
            "https://example.com/wp-content/a.jpg"
        );
    }

    #[test]
    fn relative_url_without_base_fails() {
        let d = downloader(None);
        assert!(d.normalize_url("/wp-content/a.jpg").is_err());
    }

    #[test]
    fn filename_strips_query() {
        assert_eq!(
            filename_from_url("https://a/img/photo.png?w=600&h=400"),
            "photo.png"
        );
    }

    #[test]
    fn filename_without_extension_gets_jpg() {
        assert_eq!(filename_from_url("https://a/img/photo"), "photo.jpg");
    }

    #[test]
    fn filename_keeps_known_extensions() {
        assert_eq!(filename_from_url("https://a/b/c.webp"), "c.webp");
        assert_eq!(filename_from_url("https://a/b/C.JPEG"), "C.JPEG");
    }

    #[test]
    fn extension_of_known_types() {
        assert_eq!(extension_of("photo.webp"), Some("webp"));
        assert_eq!(extension_of("photo.JPG"), Some("JPG"));
        assert_eq!(extension_of("archive.tar"), None);
    }
}
