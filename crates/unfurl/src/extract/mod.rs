// ABOUTME: Ordered metadata strategy chain with a priority-merge accumulator.
// ABOUTME: Custom fetchers, oEmbed, and OpenGraph compete; the HTML scan always backstops.

pub mod html_scan;
pub mod oembed;
pub mod opengraph;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::blacklist::TitleBlacklist;
use crate::resource::PageChunk;
use crate::result::{Metadata, UnfurlResult};

pub use oembed::OembedLookup;

/// A pluggable custom metadata fetcher invoked ahead of every built-in
/// strategy. Returns None when it does not handle the URL.
pub type FetchFunc = Arc<dyn Fn(&Url) -> Option<Metadata> + Send + Sync>;

/// Everything the extractor chain needs from the service instance.
pub(crate) struct ExtractContext<'a> {
    pub http: &'a reqwest::Client,
    pub headers: &'a HashMap<String, String>,
    pub fetchers: &'a [FetchFunc],
    pub oembed_lookup: Option<&'a OembedLookup>,
    pub title_blacklist: &'a TitleBlacklist,
}

impl ExtractContext<'_> {
    /// A blacklisted title discards the strategy's whole contribution, not
    /// just the title field.
    fn admit(&self, meta: &Metadata, strategy: &str, url: &Url) -> bool {
        if self.title_blacklist.matches(&meta.title) {
            debug!(url = %url, strategy, title = %meta.title, "discarding blacklisted title");
            return false;
        }
        true
    }
}

/// Run the strategy chain over a website-category chunk, merging into
/// `result`. The chain is priority-merge, not strict short-circuit: the
/// first matching strategy wins its fields, and the generic HTML scan still
/// runs afterwards to fill any title/description/icon left empty.
pub(crate) async fn run_chain(ctx: &ExtractContext<'_>, chunk: &PageChunk, result: &mut UnfurlResult) {
    let mut matched = false;

    // Custom fetchers, in configured order; the first valid match stops the
    // list but per-strategy failures just move on.
    for fetcher in ctx.fetchers {
        let Some(meta) = fetcher(&chunk.url) else {
            continue;
        };
        if !meta.valid() || !ctx.admit(&meta, "custom", &chunk.url) {
            continue;
        }
        result.merge(&meta);
        matched = true;
        break;
    }

    if !matched {
        if let Some(endpoint) = oembed::endpoint_for(chunk, ctx.oembed_lookup) {
            match oembed::fetch(ctx.http, &endpoint, ctx.headers).await {
                Ok(meta) if meta.valid() && ctx.admit(&meta, "oembed", &chunk.url) => {
                    result.merge(&meta);
                    matched = true;
                }
                Ok(_) => {}
                Err(err) => debug!(url = %chunk.url, error = %err, "oEmbed strategy failed"),
            }
        }
    }

    if !matched {
        if let Some(meta) = opengraph::parse(chunk) {
            if ctx.admit(&meta, "opengraph", &chunk.url) {
                result.merge(&meta);
            }
        }
    }

    // Backstop: generic tag scan fills whatever is still empty. Merge never
    // overrides image fields an earlier strategy populated.
    if let Some(meta) = html_scan::parse(chunk) {
        if ctx.admit(&meta, "html_scan", &chunk.url) {
            result.merge(&meta);
        }
    }
}
