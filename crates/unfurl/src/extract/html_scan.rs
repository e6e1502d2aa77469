// ABOUTME: Generic HTML tag scan capturing <title>, meta description, and rel=icon links.
// ABOUTME: Head-only backstop strategy run after every other strategy to fill empty fields.

use scraper::{Html, Selector};

use crate::resource::PageChunk;
use crate::result::Metadata;

/// Scan the head of a fetched document for the generic fallback tags: the
/// first `<title>`, the first `<meta name="description">`, and the first
/// `<link>` whose whitespace-delimited rel tokens include "icon".
///
/// These tags are expected only in `<head>`, so the body is never consulted.
/// Returns None unless a title or description was found; an icon alone is
/// not usable metadata.
pub fn parse(chunk: &PageChunk) -> Option<Metadata> {
    let document = Html::parse_document(&chunk.text());
    let mut meta = Metadata::default();

    if let Ok(sel) = Selector::parse("head > title") {
        if let Some(title) = document.select(&sel).next() {
            meta.title = title.text().collect::<String>().trim().to_string();
        }
    }

    if let Ok(sel) = Selector::parse("head > meta[name='description']") {
        if let Some(elem) = document.select(&sel).next() {
            if let Some(content) = elem.value().attr("content") {
                meta.description = content.trim().to_string();
            }
        }
    }

    if let Ok(sel) = Selector::parse("head > link[rel][href]") {
        for link in document.select(&sel) {
            let rel = link.value().attr("rel").unwrap_or_default();
            let is_icon = rel
                .split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("icon"));
            if !is_icon {
                continue;
            }
            if let Some(href) = link.value().attr("href") {
                if !href.is_empty() {
                    meta.icon_url = href.to_string();
                    meta.icon_type = link.value().attr("type").unwrap_or_default().to_string();
                    break;
                }
            }
        }
    }

    if meta.title.is_empty() && meta.description.is_empty() {
        return None;
    }
    Some(meta)
}
