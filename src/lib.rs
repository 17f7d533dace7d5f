//! Altgen - cached, rate-bounded AI alt-text enrichment for image migration
//!
//! This crate turns a list of image URLs into downloaded bytes plus
//! AI-generated (or deterministically derived) alt text and SEO-safe
//! filenames, for consumption by a static-site content migration.
//!
//! The pipeline is built from four pieces: a persistent TTL-bounded result
//! cache, an enrichment client with retry/backoff and tolerant response
//! parsing, a semaphore-based concurrency limiter, and an orchestrator that
//! drives the per-image workflow and degrades gracefully — a single bad
//! image never fails a run.
//!
//! # Example
//!
//! ```rust,no_run
//! use altgen::{EnrichConfig, ImageProcessor};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> altgen::Result<()> {
//!     let processor = ImageProcessor::new(
//!         EnrichConfig::new()
//!             .api_key("v-your-key")
//!             .language("de")
//!             .max_concurrent(3),
//!     )?;
//!
//!     let urls = vec!["https://example.com/wp-content/uploads/fox.jpg".to_string()];
//!     let images = processor.process_images(&urls, Path::new("./out/images")).await;
//!
//!     for image in &images {
//!         match &image.error {
//!             None => println!("{} -> {} ({})", image.original_url, image.final_filename, image.alt_text),
//!             Some(e) => eprintln!("{} failed: {e}", image.original_url),
//!         }
//!     }
//!
//!     let stats = processor.stats();
//!     println!("{} processed, {} AI-enhanced, {} credits",
//!         stats.processed_count, stats.ai_enhanced_count, stats.total_credits_used);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod limiter;
pub mod processor;
pub mod retry;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CACHE_FORMAT_VERSION, CacheEntry, CacheStore, ResultCache, SessionCache};
pub use client::{DescriptionBackend, Enricher, VisionatiClient};
pub use config::EnrichConfig;
pub use download::Downloader;
pub use error::{AltgenError, Result};
pub use limiter::RequestLimiter;
pub use processor::ImageProcessor;
pub use retry::RetryConfig;
pub use types::{EnrichmentResponse, PipelineStats, ProcessedImage};
