//! Orchestrator: the public entry point of the pipeline.
//!
//! [`ImageProcessor`] turns a list of image URLs plus a destination
//! directory into [`ProcessedImage`] records, coordinating enrichment,
//! download, and fallback. A run never aborts because of image-level
//! problems: enrichment failure degrades to deterministic fallback text,
//! download failure yields a per-item error record, and the batch contract
//! guarantees one output per input URL.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::client::{DescriptionBackend, Enricher, VisionatiClient, sanitize_filename};
use crate::download::{Downloader, extension_of, filename_from_url};
use crate::limiter::RequestLimiter;
use crate::telemetry;
use crate::types::{EnrichmentResponse, PipelineStats, ProcessedImage};
use crate::{EnrichConfig, Result};

#[derive(Default)]
struct StatsInner {
    processed: AtomicU64,
    ai_enhanced: AtomicU64,
    failed: AtomicU64,
    credits: AtomicU64,
    bytes: AtomicU64,
}

/// Drives the per-image workflow across many images with bounded
/// concurrency, and aggregates run statistics.
pub struct ImageProcessor {
    config: EnrichConfig,
    enricher: Option<Enricher>,
    downloader: Downloader,
    limiter: RequestLimiter,
    stats: Arc<StatsInner>,
}

impl ImageProcessor {
    /// Build a processor from the configuration.
    ///
    /// Enrichment requested without an API key is a setup problem, not a
    /// fatal one: it is logged and the pipeline runs in fallback-only mode.
    pub fn new(config: EnrichConfig) -> Result<Self> {
        let enricher = if config.enabled {
            match VisionatiClient::new(&config) {
                Ok(client) => Some(Enricher::new(&config, Arc::new(client))),
                Err(e) => {
                    warn!(error = %e, "enrichment disabled, continuing with fallback alt text");
                    None
                }
            }
        } else {
            None
        };

        Self::assemble(config, enricher)
    }

    /// Build a processor over a caller-supplied backend.
    ///
    /// Used by tests to substitute stub backends, and by callers that bring
    /// their own description service.
    pub fn with_backend(config: EnrichConfig, backend: Arc<dyn DescriptionBackend>) -> Result<Self> {
        let enricher = config
            .enabled
            .then(|| Enricher::new(&config, backend));
        Self::assemble(config, enricher)
    }

    fn assemble(config: EnrichConfig, enricher: Option<Enricher>) -> Result<Self> {
        let downloader = Downloader::new(config.timeout, config.image_base_url.clone())?;
        let limiter = RequestLimiter::new(config.max_concurrent, config.batch_delay);
        Ok(Self {
            config,
            enricher,
            downloader,
            limiter,
            stats: Arc::new(StatsInner::default()),
        })
    }

    /// Process every URL, returning exactly one [`ProcessedImage`] per
    /// input, in input order.
    ///
    /// URLs are worked in batches of the configured concurrency limit; a
    /// per-URL failure yields a record with `error` set rather than
    /// omitting that URL or aborting the batch. The persistent cache is
    /// flushed once the batch completes.
    pub async fn process_images(
        &self,
        urls: &[String],
        destination_dir: &Path,
    ) -> Vec<ProcessedImage> {
        let results = self
            .limiter
            .process_batches(urls, |url| self.process_one(url, destination_dir))
            .await;

        if let Some(enricher) = &self.enricher {
            enricher.persist();
        }

        let stats = self.stats();
        info!(
            processed = stats.processed_count,
            ai_enhanced = stats.ai_enhanced_count,
            failed = stats.failed_count,
            credits = stats.total_credits_used,
            "batch complete"
        );

        results
    }

    /// The per-image workflow: enrich (optional), name, alt text, download,
    /// assemble. Infallible by contract — failures land in the record.
    async fn process_one(&self, url: &str, destination_dir: &Path) -> ProcessedImage {
        let ai_metadata = match &self.enricher {
            Some(enricher) => match enricher.generate_alt_text(url).await {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(url, error = %e, "enrichment failed, using fallback alt text");
                    None
                }
            },
            None => None,
        };

        let original_filename = filename_from_url(url);
        let (final_filename, alt_text, ai_enhanced, credits_used) =
            finalize_metadata(&original_filename, ai_metadata.as_ref());

        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        self.stats.credits.fetch_add(credits_used, Ordering::Relaxed);
        metrics::counter!(telemetry::CREDITS_TOTAL).increment(credits_used);

        let destination_path = destination_dir.join(&final_filename);

        match self.downloader.fetch(url).await {
            Ok(data) => {
                // Counted here, not at enrichment time: a record that fails
                // its download reports ai_enhanced=false and must not be
                // counted as enhanced.
                if ai_enhanced {
                    self.stats.ai_enhanced.fetch_add(1, Ordering::Relaxed);
                }
                self.stats
                    .bytes
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                metrics::counter!(telemetry::DOWNLOAD_BYTES_TOTAL).increment(data.len() as u64);
                metrics::counter!(telemetry::IMAGES_PROCESSED_TOTAL, "status" => "ok")
                    .increment(1);
                debug!(url, filename = final_filename, bytes = data.len(), "image processed");

                ProcessedImage {
                    original_url: url.to_string(),
                    original_filename,
                    final_filename,
                    alt_text,
                    destination_path,
                    data,
                    ai_enhanced,
                    credits_used,
                    error: None,
                }
            }
            Err(e) => {
                warn!(url, error = %e, "image download failed");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::IMAGES_PROCESSED_TOTAL, "status" => "error")
                    .increment(1);

                ProcessedImage {
                    original_url: url.to_string(),
                    original_filename,
                    final_filename,
                    alt_text,
                    destination_path,
                    data: Vec::new(),
                    ai_enhanced: false,
                    credits_used,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Snapshot of the statistics accumulated across this processor's runs.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            processed_count: self.stats.processed.load(Ordering::Relaxed),
            ai_enhanced_count: self.stats.ai_enhanced.load(Ordering::Relaxed),
            failed_count: self.stats.failed.load(Ordering::Relaxed),
            total_credits_used: self.stats.credits.load(Ordering::Relaxed),
            downloaded_bytes: self.stats.bytes.load(Ordering::Relaxed),
        }
    }

    /// Zero the statistics and clear the session cache, readying the
    /// processor for an independent run within the same process.
    pub fn reset(&self) {
        self.stats.processed.store(0, Ordering::Relaxed);
        self.stats.ai_enhanced.store(0, Ordering::Relaxed);
        self.stats.failed.store(0, Ordering::Relaxed);
        self.stats.credits.store(0, Ordering::Relaxed);
        self.stats.bytes.store(0, Ordering::Relaxed);
        if let Some(enricher) = &self.enricher {
            enricher.clear_session();
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }
}

/// Compute final filename, alt text, and accounting from the optional
/// enrichment result.
///
/// An error-free AI result with a filename wins, keeping the original file
/// extension; otherwise the original filename is sanitized. Alt text falls
/// back from the AI description to the cleaned original filename to a
/// generic templated string.
fn finalize_metadata(
    original_filename: &str,
    ai: Option<&EnrichmentResponse>,
) -> (String, String, bool, u64) {
    let extension = extension_of(original_filename).unwrap_or("jpg");

    let ai_ok = ai.filter(|r| r.error.is_none());

    let final_filename = match ai_ok {
        Some(r) if !r.filename.is_empty() => format!("{}.{}", r.filename, extension),
        _ => {
            let stem = sanitize_filename(original_filename);
            if stem.is_empty() {
                original_filename.to_string()
            } else {
                format!("{stem}.{extension}")
            }
        }
    };

    let (alt_text, ai_enhanced) = match ai_ok {
        Some(r) if !r.description.is_empty() => (r.description.clone(), true),
        _ => (fallback_alt_text(original_filename), false),
    };

    let credits_used = ai_ok.map_or(0, |r| r.credits_used);

    (final_filename, alt_text, ai_enhanced, credits_used)
}

/// Deterministic alt text from the original filename: extension stripped,
/// separators spaced out. Falls back to a generic template when nothing
/// readable remains.
fn fallback_alt_text(original_filename: &str) -> String {
    let stem = original_filename
        .rsplit_once('.')
        .map_or(original_filename, |(stem, _)| stem);
    let cleaned = stem
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        format!("Image: {original_filename}")
    } else {
        cleaned
    }
}
