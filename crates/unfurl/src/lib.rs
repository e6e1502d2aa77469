// ABOUTME: Main library entry point for the unfurl metadata service core.
// ABOUTME: Re-exports the public API: Service, ServiceBuilder, UnfurlResult, Metadata, Cache.

//! unfurl-core - a URL metadata unfurling pipeline.
//!
//! Given a batch of URLs, the service concurrently fetches each resource,
//! classifies its media type, and extracts title/description/preview-image/
//! icon metadata using a prioritized chain of strategies (custom fetchers,
//! oEmbed, OpenGraph, generic HTML tags), returning one normalized result
//! per URL in the caller's original order. Identical URLs requested
//! concurrently share a single outbound fetch.
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use unfurl_core::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = Service::builder().build();
//!     let urls = vec!["https://example.com/page".to_string()];
//!     let results = service.unfurl(&CancellationToken::new(), &urls).await;
//!     println!("{}", serde_json::to_string_pretty(&results).unwrap());
//! }
//! ```

pub mod blacklist;
pub mod cache;
pub mod error;
pub mod extract;
pub mod options;
pub mod postprocess;
pub mod resource;
pub mod result;
pub mod service;
pub mod sniff;
pub mod urls;

pub use crate::cache::{cache_key, Cache, MemoryCache};
pub use crate::error::{ErrorCode, UnfurlError};
pub use crate::extract::{FetchFunc, OembedLookup};
pub use crate::options::{Options, ServiceBuilder, DEFAULT_MAX_BATCH_URLS};
pub use crate::postprocess::{HeaderProber, ImageProber};
pub use crate::resource::{PageChunk, DEFAULT_MAX_BODY_CHUNK_SIZE};
pub use crate::result::{MediaType, Metadata, UnfurlResult};
pub use crate::service::Service;
pub use crate::urls::parse_urls_max;
