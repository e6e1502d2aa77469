// ABOUTME: The Service: batch orchestration, per-URL pipeline, and in-flight deduplication.
// ABOUTME: At most one outbound fetch pipeline runs per distinct URL across concurrent batches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::blacklist::{PrefixBlacklist, TitleBlacklist};
use crate::cache::{cache_key, Cache};
use crate::extract::{self, ExtractContext, FetchFunc, OembedLookup};
use crate::options::{Options, ServiceBuilder};
use crate::postprocess::{post_process, HeaderProber, ImageProber};
use crate::resource::fetch_chunk;
use crate::result::{MediaType, UnfurlResult};
use crate::sniff;

type FlightMap = Arc<Mutex<HashMap<String, watch::Sender<()>>>>;

/// The unfurl service. Cheap to clone; all state is shared behind an Arc and
/// scoped to the instance, so independent services never serialize each
/// other's pipelines.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    headers: HashMap<String, String>,
    max_body_chunk_size: usize,
    max_batch_urls: usize,
    prefix_blacklist: PrefixBlacklist,
    title_blacklist: TitleBlacklist,
    cache: Option<Arc<dyn Cache>>,
    oembed_lookup: Option<OembedLookup>,
    fetchers: Vec<FetchFunc>,
    prober: Option<Arc<dyn ImageProber>>,
    in_flight: FlightMap,
}

/// Removes the owner's registry entry on every exit path. Dropping the entry
/// drops its watch sender, which releases all waiters queued at that point.
struct FlightGuard {
    in_flight: FlightMap,
    url: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .expect("in-flight lock")
            .remove(&self.url);
    }
}

enum Acquired {
    Owner(FlightGuard),
    Cancelled,
}

impl Service {
    /// Create a new ServiceBuilder for configuring the service.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Create a new Service with the given options.
    pub fn new(opts: Options) -> Self {
        let http = opts.http_client.clone().unwrap_or_else(|| {
            reqwest::Client::builder()
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .expect("failed to build HTTP client")
        });

        let prober = if opts.fetch_image_size {
            Some(
                opts.prober
                    .clone()
                    .unwrap_or_else(|| Arc::new(HeaderProber) as Arc<dyn ImageProber>),
            )
        } else {
            None
        };

        Self {
            inner: Arc::new(Inner {
                http,
                headers: opts.headers,
                max_body_chunk_size: opts.max_body_chunk_size,
                max_batch_urls: opts.max_batch_urls,
                prefix_blacklist: PrefixBlacklist::new(&opts.url_blacklist),
                title_blacklist: TitleBlacklist::new(&opts.title_blacklist),
                cache: opts.cache,
                oembed_lookup: opts.oembed_lookup,
                fetchers: opts.fetchers,
                prober,
                in_flight: Arc::new(Mutex::new(HashMap::new())),
            }),
        }
    }

    /// Unfurl a batch of URLs concurrently, returning one result per accepted
    /// URL in the caller's original order. URLs beyond the batch cap are
    /// silently dropped. If `cancel` fires before all results arrive, the
    /// wait is abandoned and the results collected so far are returned.
    pub async fn unfurl(&self, cancel: &CancellationToken, urls: &[String]) -> Vec<UnfurlResult> {
        let urls: Vec<String> = urls
            .iter()
            .take(self.inner.max_batch_urls)
            .cloned()
            .collect();

        // Buffered for at least one in-flight delivery so producers never
        // block on an abandoned batch.
        let (tx, mut rx) = mpsc::channel::<UnfurlResult>(urls.len().max(1));
        for (idx, link) in urls.iter().enumerate() {
            let service = self.clone();
            let cancel = cancel.clone();
            let link = link.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    result = service.process_url(&cancel, idx, &link) => result,
                    _ = cancel.cancelled() => UnfurlResult::bare(idx, &link),
                };
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(urls.len());
        for _ in 0..urls.len() {
            // Cancellation wins over a result racing in on the same tick.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(result) => results.push(result),
                    None => break,
                },
            }
        }

        // Completion order is nondeterministic; output order is input order.
        results.sort_by_key(|r| r.idx);
        for result in &mut results {
            result.normalize();
        }
        results
    }

    /// Unfurl the URLs found in free text, up to the batch cap.
    pub async fn unfurl_text(&self, cancel: &CancellationToken, content: &str) -> Vec<UnfurlResult> {
        let urls = crate::urls::parse_urls_max(content, self.inner.max_batch_urls);
        self.unfurl(cancel, &urls).await
    }

    /// Acquire ownership of the pipeline for `url`, waiting while another
    /// pipeline for the same URL is in flight. Waiters re-check after each
    /// release; a waiter whose cancellation fires returns immediately without
    /// ever touching the registry.
    async fn acquire(&self, cancel: &CancellationToken, url: &str) -> Acquired {
        let mut wait_logged = false;
        loop {
            let mut rx = {
                let mut map = self.inner.in_flight.lock().expect("in-flight lock");
                match map.get(url) {
                    None => {
                        let (tx, _) = watch::channel(());
                        map.insert(url.to_string(), tx);
                        return Acquired::Owner(FlightGuard {
                            in_flight: self.inner.in_flight.clone(),
                            url: url.to_string(),
                        });
                    }
                    // Subscribing under the lock means the release (sender
                    // drop) cannot be missed.
                    Some(tx) => tx.subscribe(),
                }
            };
            if !wait_logged {
                debug!(url, "waiting for in-flight request to complete");
                wait_logged = true;
            }
            tokio::select! {
                _ = rx.changed() => {}
                _ = cancel.cancelled() => return Acquired::Cancelled,
            }
        }
    }

    /// Run the full pipeline for one URL: in-flight acquisition, blacklist,
    /// cache read, fetch, classify, extract, post-process, cache write.
    /// Every failure mode degrades to a bare-URL result.
    async fn process_url(&self, cancel: &CancellationToken, idx: usize, link: &str) -> UnfurlResult {
        let mut result = UnfurlResult::bare(idx, link);

        let _guard = match self.acquire(cancel, link).await {
            Acquired::Owner(guard) => guard,
            Acquired::Cancelled => return result,
        };

        if self.inner.prefix_blacklist.matches(link) {
            debug!(url = link, "blacklisted");
            return result;
        }

        if let Some(cache) = &self.inner.cache {
            if let Some(payload) = cache.get(&cache_key(link)).await {
                match serde_json::from_slice::<UnfurlResult>(&payload) {
                    Ok(mut cached) => {
                        debug!(url = link, "cache hit");
                        cached.idx = idx;
                        return cached;
                    }
                    // A corrupt payload is a miss, not an error.
                    Err(err) => debug!(url = link, error = %err, "corrupt cache payload"),
                }
            }
        }

        let chunk = match fetch_chunk(
            &self.inner.http,
            link,
            &self.inner.headers,
            self.inner.max_body_chunk_size,
        )
        .await
        {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(url = link, error = %err, "fetch failed");
                return result;
            }
        };

        match sniff::classify(sniff::detect_content_type(&chunk.data)) {
            MediaType::Image => {
                // The resource is its own preview.
                result.kind = MediaType::Image;
                result.image = chunk.url.to_string();
            }
            MediaType::Video => {
                result.kind = MediaType::Video;
            }
            MediaType::Website => {
                let ctx = ExtractContext {
                    http: &self.inner.http,
                    headers: &self.inner.headers,
                    fetchers: &self.inner.fetchers,
                    oembed_lookup: self.inner.oembed_lookup.as_ref(),
                    title_blacklist: &self.inner.title_blacklist,
                };
                extract::run_chain(&ctx, &chunk, &mut result).await;
                // A strategy may have refined the category (e.g. og:type
                // video); otherwise text content is a website.
                if result.kind.is_unknown() {
                    result.kind = MediaType::Website;
                }
            }
            MediaType::Unknown => {}
        }

        post_process(
            &mut result,
            &chunk.url,
            &self.inner.http,
            self.inner.prober.as_deref(),
        )
        .await;

        if let Some(cache) = &self.inner.cache {
            if !result.is_empty() {
                match serde_json::to_vec(&result) {
                    Ok(payload) => {
                        debug!(url = link, "cache update");
                        cache.set(&cache_key(link), &payload).await;
                    }
                    Err(err) => debug!(url = link, error = %err, "cache encode failed"),
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_owner_acquires_and_releases() {
        let service = Service::builder().build();
        let cancel = CancellationToken::new();

        let guard = match service.acquire(&cancel, "https://example.com/a").await {
            Acquired::Owner(guard) => guard,
            Acquired::Cancelled => panic!("should own"),
        };
        assert_eq!(service.inner.in_flight.lock().unwrap().len(), 1);
        drop(guard);
        assert!(service.inner.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_distinct_urls_do_not_serialize() {
        let service = Service::builder().build();
        let cancel = CancellationToken::new();

        let _a = service.acquire(&cancel, "https://example.com/a").await;
        // Owning /a must not block acquiring /b; a timeout here would mean a
        // global lock serializes unrelated URLs.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            service.acquire(&cancel, "https://example.com/b"),
        )
        .await
        .expect("acquire of unrelated URL must not block");
        assert!(matches!(acquired, Acquired::Owner(_)));
    }

    #[tokio::test]
    async fn test_waiter_blocks_until_owner_releases() {
        let service = Service::builder().build();
        let cancel = CancellationToken::new();
        let url = "https://example.com/same";

        let guard = match service.acquire(&cancel, url).await {
            Acquired::Owner(guard) => guard,
            Acquired::Cancelled => panic!("should own"),
        };

        let waiter_service = service.clone();
        let waiter_cancel = cancel.clone();
        let waiter = tokio::spawn(async move {
            waiter_service.acquire(&waiter_cancel, url).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be released")
            .unwrap();
        assert!(matches!(acquired, Acquired::Owner(_)));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_returns_without_registry_entry() {
        let service = Service::builder().build();
        let cancel = CancellationToken::new();
        let url = "https://example.com/held";

        let _guard = service.acquire(&cancel, url).await;

        let waiter_service = service.clone();
        let waiter_cancel = cancel.clone();
        let waiter = tokio::spawn(async move {
            waiter_service.acquire(&waiter_cancel, url).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let acquired = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled waiter must not block")
            .unwrap();
        assert!(matches!(acquired, Acquired::Cancelled));
        // only the owner's entry remains
        assert_eq!(service.inner.in_flight.lock().unwrap().len(), 1);
    }
}
