//! Core data types shared across the pipeline.

/// Normalized result of one enrichment call.
///
/// Ephemeral — on success the processor folds it into a persistent
/// [`CacheEntry`](crate::cache::CacheEntry); on a degraded result `error`
/// carries the reason and the description/filename are locally synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResponse {
    /// Human-readable alt text.
    pub description: String,
    /// SEO-safe filename, extension-less.
    pub filename: String,
    /// Credits the upstream service charged for this call. `0` on cache hits
    /// and fallback results.
    pub credits_used: u64,
    /// Present only on a degraded/fallback result.
    pub error: Option<String>,
}

/// One processed image, as returned by
/// [`ImageProcessor::process_images`](crate::ImageProcessor::process_images).
///
/// Constructed once per URL per run and never mutated afterwards; the caller
/// owns it exclusively and is responsible for writing `data` to
/// `destination_path`.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// The URL the caller supplied.
    pub original_url: String,
    /// Filename extracted from the URL (extension included).
    pub original_filename: String,
    /// Enriched filename with the original extension, or the sanitized
    /// original when enrichment did not produce one.
    pub final_filename: String,
    /// AI description, cleaned-filename fallback, or generic template.
    pub alt_text: String,
    /// `destination_dir/final_filename`.
    pub destination_path: std::path::PathBuf,
    /// Raw image bytes. Empty when `error` is set.
    pub data: Vec<u8>,
    /// Whether `alt_text`/`final_filename` came from the enrichment service.
    pub ai_enhanced: bool,
    /// Credits spent on this image.
    pub credits_used: u64,
    /// Set when the download failed — the one per-image hard failure.
    pub error: Option<String>,
}

/// Aggregate statistics for one processor run.
///
/// Snapshot type returned by [`ImageProcessor::stats`](crate::ImageProcessor::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Images run through the pipeline (successes and failures).
    pub processed_count: u64,
    /// Successfully produced images whose alt text came from the enrichment
    /// service. Failed downloads never count, even when enriched first.
    pub ai_enhanced_count: u64,
    /// Images whose download failed.
    pub failed_count: u64,
    /// Total credits the upstream service charged.
    pub total_credits_used: u64,
    /// Total image bytes downloaded.
    pub downloaded_bytes: u64,
}
