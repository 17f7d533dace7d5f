//! Caching subsystem.
//!
//! Two tiers, invalidated through the single fingerprint function on
//! [`EnrichConfig`](crate::EnrichConfig):
//!
//! - [`store::ResultCache`] — durable, TTL-bounded store on disk mapping an
//!   image URL to a previously computed enrichment result. Survives runs;
//!   a hit costs zero credits.
//!
//! - [`session::SessionCache`] — run-scoped in-memory memo that
//!   de-duplicates enrichment work within one process. Cleared by
//!   [`ImageProcessor::reset()`](crate::ImageProcessor::reset).

pub mod session;
pub mod store;

pub use session::SessionCache;
pub use store::{CACHE_FORMAT_VERSION, CacheEntry, CacheStore, ResultCache};
