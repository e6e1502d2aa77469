// ABOUTME: oEmbed extraction strategy: provider lookup, endpoint discovery, and document fetch.
// ABOUTME: Handles JSON oEmbed documents; photo/video types map onto media categories.

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{Html, Selector};
use serde::{Deserialize, Deserializer};

use crate::error::UnfurlError;
use crate::resource::PageChunk;
use crate::result::{MediaType, Metadata};

/// Collaborator resolving a page URL to its oEmbed endpoint via a static
/// provider registry. Returns None when no provider matches; discovery from
/// the page itself is the fallback.
pub type OembedLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A JSON oEmbed document as returned by a provider endpoint.
#[derive(Debug, Deserialize)]
struct OembedDoc {
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    provider_name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    thumbnail_url: String,
    #[serde(default, deserialize_with = "dimension")]
    thumbnail_width: u32,
    #[serde(default, deserialize_with = "dimension")]
    thumbnail_height: u32,
    #[serde(default, deserialize_with = "dimension")]
    width: u32,
    #[serde(default, deserialize_with = "dimension")]
    height: u32,
}

/// Providers are inconsistent about dimension types; accept numbers and
/// numeric strings, treating anything else as unknown.
fn dimension<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

impl OembedDoc {
    fn into_metadata(self) -> Metadata {
        let mut meta = Metadata {
            title: self.title,
            site_name: self.provider_name,
            ..Default::default()
        };
        match self.kind.as_str() {
            // For photos the url field is the image itself
            "photo" => {
                meta.kind = MediaType::Image;
                meta.image = self.url;
                meta.image_width = self.width;
                meta.image_height = self.height;
            }
            "video" => {
                meta.kind = MediaType::Video;
                meta.image = self.thumbnail_url;
                meta.image_width = self.thumbnail_width;
                meta.image_height = self.thumbnail_height;
            }
            _ => {
                meta.kind = MediaType::Website;
                meta.image = self.thumbnail_url;
                meta.image_width = self.thumbnail_width;
                meta.image_height = self.thumbnail_height;
            }
        }
        meta
    }
}

/// Find an oEmbed endpoint for a fetched page: first via the provider
/// registry collaborator, then by scanning the page for a JSON oEmbed
/// discovery link.
pub fn endpoint_for(chunk: &PageChunk, lookup: Option<&OembedLookup>) -> Option<String> {
    if let Some(lookup) = lookup {
        if let Some(endpoint) = lookup(chunk.url.as_str()) {
            return Some(endpoint);
        }
    }
    discover(chunk)
}

/// Scan a page for a `<link rel="alternate" type="application/json+oembed">`
/// discovery hint, resolving a relative href against the page URL.
fn discover(chunk: &PageChunk) -> Option<String> {
    let document = Html::parse_document(&chunk.text());
    let sel = Selector::parse("link[rel][type][href]").ok()?;
    for link in document.select(&sel) {
        let rel = link.value().attr("rel").unwrap_or_default();
        let is_alternate = rel
            .split_whitespace()
            .any(|token| token.eq_ignore_ascii_case("alternate"));
        if !is_alternate {
            continue;
        }
        let link_type = link.value().attr("type").unwrap_or_default();
        if !link_type.eq_ignore_ascii_case("application/json+oembed") {
            continue;
        }
        if let Some(href) = link.value().attr("href") {
            if let Ok(resolved) = chunk.url.join(href) {
                return Some(resolved.to_string());
            }
        }
    }
    None
}

/// Fetch and parse an oEmbed document from `endpoint`.
///
/// A malformed document is terminal for this strategy only; the caller moves
/// on to the next strategy in the chain.
pub async fn fetch(
    client: &reqwest::Client,
    endpoint: &str,
    headers: &HashMap<String, String>,
) -> Result<Metadata, UnfurlError> {
    let mut request = client.get(endpoint);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    let response = request.send().await.map_err(|e| {
        UnfurlError::fetch(
            endpoint,
            "oembed_fetch",
            Some(anyhow::anyhow!("request failed: {}", e)),
        )
    })?;
    if response.status().as_u16() >= 400 {
        return Err(UnfurlError::fetch(
            endpoint,
            "oembed_fetch",
            Some(anyhow::anyhow!("bad status: {}", response.status())),
        ));
    }
    let doc: OembedDoc = response.json().await.map_err(|e| {
        UnfurlError::extract(
            endpoint,
            "oembed_fetch",
            Some(anyhow::anyhow!("malformed oEmbed document: {}", e)),
        )
    })?;
    Ok(doc.into_metadata())
}
