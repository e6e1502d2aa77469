// ABOUTME: Configuration options for the unfurl service and the fluent ServiceBuilder.
// ABOUTME: Covers outbound headers, body ceiling, blacklists, cache, and collaborator seams.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::extract::{FetchFunc, OembedLookup};
use crate::postprocess::ImageProber;
use crate::resource::DEFAULT_MAX_BODY_CHUNK_SIZE;
use crate::service::Service;

/// Largest number of URLs accepted per batch; extras are silently dropped.
pub const DEFAULT_MAX_BATCH_URLS: usize = 20;

/// Configuration options for the unfurl service.
#[derive(Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    /// Extra key-value header pairs added to each outgoing request.
    pub headers: HashMap<String, String>,
    /// Byte ceiling on how much of a response body is read.
    pub max_body_chunk_size: usize,
    /// Cap on URLs accepted per batch.
    pub max_batch_urls: usize,
    /// Issue a secondary fetch to determine image pixel dimensions.
    pub fetch_image_size: bool,
    /// Forbidden title fragments (case-insensitive substring match).
    pub title_blacklist: Vec<String>,
    /// Forbidden literal URL prefixes.
    pub url_blacklist: Vec<String>,
    pub http_client: Option<reqwest::Client>,
    pub cache: Option<Arc<dyn Cache>>,
    pub oembed_lookup: Option<OembedLookup>,
    /// Custom metadata fetchers, invoked in order before built-in strategies.
    pub fetchers: Vec<FetchFunc>,
    /// Dimension probe; HeaderProber is used when unset and probing is on.
    pub prober: Option<Arc<dyn ImageProber>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "unfurl/1.0".to_string(),
            headers: HashMap::new(),
            max_body_chunk_size: DEFAULT_MAX_BODY_CHUNK_SIZE,
            max_batch_urls: DEFAULT_MAX_BATCH_URLS,
            fetch_image_size: false,
            title_blacklist: Vec::new(),
            url_blacklist: Vec::new(),
            http_client: None,
            cache: None,
            oembed_lookup: None,
            fetchers: Vec::new(),
            prober: None,
        }
    }
}

/// Builder for constructing Service instances with custom configuration.
#[derive(Clone, Default)]
pub struct ServiceBuilder {
    opts: Options,
}

impl ServiceBuilder {
    /// Create a new ServiceBuilder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout for outbound fetches.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Add an extra header to all outgoing requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set the byte ceiling read from each response body.
    pub fn max_body_chunk_size(mut self, size: usize) -> Self {
        self.opts.max_body_chunk_size = size;
        self
    }

    /// Set the cap on URLs accepted per batch.
    pub fn max_batch_urls(mut self, max: usize) -> Self {
        self.opts.max_batch_urls = max;
        self
    }

    /// Enable or disable the secondary image dimension fetch.
    pub fn fetch_image_size(mut self, enabled: bool) -> Self {
        self.opts.fetch_image_size = enabled;
        self
    }

    /// Add a forbidden title fragment.
    pub fn blacklist_title(mut self, fragment: impl Into<String>) -> Self {
        self.opts.title_blacklist.push(fragment.into());
        self
    }

    /// Add a forbidden URL prefix.
    pub fn blacklist_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.opts.url_blacklist.push(prefix.into());
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Attach an external result cache.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.opts.cache = Some(cache);
        self
    }

    /// Set the oEmbed provider registry lookup collaborator.
    pub fn oembed_lookup(mut self, lookup: OembedLookup) -> Self {
        self.opts.oembed_lookup = Some(lookup);
        self
    }

    /// Append a custom metadata fetcher; fetchers run in insertion order.
    pub fn fetcher(mut self, fetcher: FetchFunc) -> Self {
        self.opts.fetchers.push(fetcher);
        self
    }

    /// Use a custom dimension probe instead of the header-only default.
    pub fn prober(mut self, prober: Arc<dyn ImageProber>) -> Self {
        self.opts.prober = Some(prober);
        self
    }

    /// Build the Service with the configured options.
    pub fn build(self) -> Service {
        Service::new(self.opts)
    }
}
