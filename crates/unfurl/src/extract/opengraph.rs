// ABOUTME: OpenGraph extraction strategy reading og:* meta tags from a page chunk.
// ABOUTME: Produces Metadata; a page without og tags yields an invalid (empty) value.

use scraper::{Html, Selector};

use crate::resource::PageChunk;
use crate::result::{MediaType, Metadata};

/// Helper to extract the content of the first `meta[property=...]` tag.
fn get_meta_property(document: &Html, property: &str) -> Option<String> {
    let sel_str = format!("meta[property='{}']", property);
    let sel = Selector::parse(&sel_str).ok()?;
    let elem = document.select(&sel).next()?;
    let content = elem.value().attr("content")?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Map an og:type value to a coarse media category.
///
/// OpenGraph types are dotted vocabularies ("video.movie", "music.song");
/// only the leading token matters here.
fn map_og_type(og_type: &str) -> MediaType {
    match og_type.split('.').next().unwrap_or("") {
        "video" => MediaType::Video,
        _ => MediaType::Website,
    }
}

/// Parse OpenGraph meta tags from a fetched chunk into Metadata.
///
/// Returns None when the document carries no usable og tags; parse errors
/// are treated the same way (terminal per strategy, not per URL).
pub fn parse(chunk: &PageChunk) -> Option<Metadata> {
    let document = Html::parse_document(&chunk.text());

    let mut meta = Metadata {
        title: get_meta_property(&document, "og:title").unwrap_or_default(),
        description: get_meta_property(&document, "og:description").unwrap_or_default(),
        site_name: get_meta_property(&document, "og:site_name").unwrap_or_default(),
        image: get_meta_property(&document, "og:image")
            .or_else(|| get_meta_property(&document, "og:image:url"))
            .unwrap_or_default(),
        ..Default::default()
    };

    if let Some(og_type) = get_meta_property(&document, "og:type") {
        meta.kind = map_og_type(&og_type);
    } else if meta.valid() {
        meta.kind = MediaType::Website;
    }

    if !meta.image.is_empty() {
        meta.image_width = get_meta_property(&document, "og:image:width")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        meta.image_height = get_meta_property(&document, "og:image:height")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
    }

    if meta.valid() {
        Some(meta)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn chunk(html: &str) -> PageChunk {
        PageChunk {
            data: html.as_bytes().to_vec(),
            url: Url::parse("https://example.com/page").unwrap(),
            content_type: "text/html; charset=utf-8".to_string(),
        }
    }

    #[test]
    fn test_parse_full_og_tags() {
        let html = r#"<html><head>
            <meta property="og:title" content="OG Title">
            <meta property="og:description" content="OG Description">
            <meta property="og:site_name" content="Example">
            <meta property="og:type" content="article">
            <meta property="og:image" content="https://cdn.example.com/hero.jpg">
            <meta property="og:image:width" content="1200">
            <meta property="og:image:height" content="630">
        </head><body></body></html>"#;

        let meta = parse(&chunk(html)).expect("should extract og metadata");
        assert_eq!(meta.title, "OG Title");
        assert_eq!(meta.description, "OG Description");
        assert_eq!(meta.site_name, "Example");
        assert_eq!(meta.kind, MediaType::Website);
        assert_eq!(meta.image, "https://cdn.example.com/hero.jpg");
        assert_eq!(meta.image_width, 1200);
        assert_eq!(meta.image_height, 630);
    }

    #[test]
    fn test_parse_video_type() {
        let html = r#"<html><head>
            <meta property="og:title" content="A Clip">
            <meta property="og:type" content="video.other">
        </head></html>"#;

        let meta = parse(&chunk(html)).unwrap();
        assert_eq!(meta.kind, MediaType::Video);
    }

    #[test]
    fn test_parse_no_og_tags_is_no_match() {
        let html = "<html><head><title>Plain</title></head></html>";
        assert!(parse(&chunk(html)).is_none());
    }

    #[test]
    fn test_parse_dimensions_ignored_without_image() {
        let html = r#"<html><head>
            <meta property="og:title" content="T">
            <meta property="og:image:width" content="1200">
        </head></html>"#;

        let meta = parse(&chunk(html)).unwrap();
        assert_eq!(meta.image_width, 0);
    }
}
