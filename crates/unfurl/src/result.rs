// ABOUTME: UnfurlResult and Metadata types with merge and normalization logic.
// ABOUTME: Merge is additive-only, first-non-empty-wins per field across extraction strategies.

use serde::{Deserialize, Serialize};

/// Coarse media category of an unfurled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Unknown,
    Website,
    Image,
    Video,
}

impl MediaType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, MediaType::Unknown)
    }
}

/// The per-URL output record of the unfurl pipeline.
///
/// Field names on the wire follow the original unfurlist JSON contract;
/// empty fields are omitted. The `idx` field is internal and used only to
/// restore the caller's input order before serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnfurlResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(
        rename = "url_type",
        default,
        skip_serializing_if = "MediaType::is_unknown"
    )]
    pub kind: MediaType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub site_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub image_width: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub image_height: u32,
    #[serde(rename = "icon", default, skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_type: String,

    #[serde(skip)]
    pub(crate) idx: usize,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl UnfurlResult {
    /// A result carrying only the requested URL, used whenever the pipeline
    /// degrades (fetch failure, blacklist hit, cancellation).
    pub fn bare(idx: usize, url: impl Into<String>) -> Self {
        Self {
            idx,
            url: url.into(),
            ..Default::default()
        }
    }

    /// Returns true if the result carries no meaningful data.
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
            && self.title.is_empty()
            && self.kind.is_unknown()
            && self.description.is_empty()
            && self.image.is_empty()
    }

    /// Collapse internal whitespace runs in the title to single spaces and trim.
    pub fn normalize(&mut self) {
        self.title = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    /// Merge a strategy's metadata into this result, first-non-empty-wins per
    /// field. A field already populated is never overwritten; icon URL and
    /// icon type move together.
    pub fn merge(&mut self, meta: &Metadata) {
        if self.title.is_empty() {
            self.title = meta.title.clone();
        }
        if self.kind.is_unknown() {
            self.kind = meta.kind;
        }
        if self.description.is_empty() {
            self.description = meta.description.clone();
        }
        if self.site_name.is_empty() {
            self.site_name = meta.site_name.clone();
        }
        if self.image.is_empty() {
            self.image = meta.image.clone();
        }
        if self.image_width == 0 {
            self.image_width = meta.image_width;
        }
        if self.image_height == 0 {
            self.image_height = meta.image_height;
        }
        if self.icon_url.is_empty() && !meta.icon_url.is_empty() {
            self.icon_url = meta.icon_url.clone();
            self.icon_type = meta.icon_type.clone();
        }
    }
}

/// Output contract of any extraction strategy (custom fetcher, oEmbed,
/// OpenGraph, generic HTML scan). Same field shape as [`UnfurlResult`] minus
/// the ordering index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub kind: MediaType,
    pub description: String,
    pub site_name: String,
    pub image: String,
    pub image_width: u32,
    pub image_height: u32,
    pub icon_url: String,
    pub icon_type: String,
}

impl Metadata {
    /// A Metadata value is usable only if at least one of title, description,
    /// or image is non-empty. Empty metadata means "no match", not an error.
    pub fn valid(&self) -> bool {
        !self.title.is_empty() || !self.description.is_empty() || !self.image.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_fills_empty_fields_only() {
        let mut result = UnfurlResult {
            url: "https://example.com".to_string(),
            title: "Existing".to_string(),
            ..Default::default()
        };
        let meta = Metadata {
            title: "Later".to_string(),
            description: "Filled in".to_string(),
            image: "https://example.com/a.png".to_string(),
            ..Default::default()
        };
        result.merge(&meta);

        assert_eq!(result.title, "Existing");
        assert_eq!(result.description, "Filled in");
        assert_eq!(result.image, "https://example.com/a.png");
    }

    #[test]
    fn test_merge_icon_moves_with_type() {
        let mut result = UnfurlResult::bare(0, "https://example.com");
        let meta = Metadata {
            title: "t".to_string(),
            icon_url: "/favicon.ico".to_string(),
            icon_type: "image/x-icon".to_string(),
            ..Default::default()
        };
        result.merge(&meta);
        assert_eq!(result.icon_url, "/favicon.ico");
        assert_eq!(result.icon_type, "image/x-icon");

        // A later icon never displaces an earlier one
        let other = Metadata {
            icon_url: "/other.png".to_string(),
            icon_type: "image/png".to_string(),
            ..Default::default()
        };
        result.merge(&other);
        assert_eq!(result.icon_url, "/favicon.ico");
        assert_eq!(result.icon_type, "image/x-icon");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let mut result = UnfurlResult {
            title: "  Hello \n\t  World  ".to_string(),
            ..Default::default()
        };
        result.normalize();
        assert_eq!(result.title, "Hello World");
    }

    #[test]
    fn test_metadata_validity() {
        assert!(!Metadata::default().valid());
        assert!(Metadata {
            title: "t".to_string(),
            ..Default::default()
        }
        .valid());
        assert!(Metadata {
            description: "d".to_string(),
            ..Default::default()
        }
        .valid());
        assert!(Metadata {
            image: "i".to_string(),
            ..Default::default()
        }
        .valid());
        // icon alone does not make metadata usable
        assert!(!Metadata {
            icon_url: "/favicon.ico".to_string(),
            ..Default::default()
        }
        .valid());
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let result = UnfurlResult::bare(3, "https://example.com/page");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"url": "https://example.com/page"}));
    }

    #[test]
    fn test_serialization_wire_names() {
        let result = UnfurlResult {
            url: "https://example.com".to_string(),
            title: "T".to_string(),
            kind: MediaType::Website,
            image: "https://example.com/i.png".to_string(),
            image_width: 100,
            image_height: 50,
            icon_url: "https://example.com/favicon.ico".to_string(),
            icon_type: "image/x-icon".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["url_type"], "website");
        assert_eq!(json["icon"], "https://example.com/favicon.ico");
        assert_eq!(json["image_width"], 100);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let result = UnfurlResult {
            url: "https://example.com".to_string(),
            title: "T".to_string(),
            kind: MediaType::Video,
            description: "D".to_string(),
            site_name: "S".to_string(),
            idx: 7,
            ..Default::default()
        };
        let bytes = serde_json::to_vec(&result).unwrap();
        let back: UnfurlResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.title, "T");
        assert_eq!(back.kind, MediaType::Video);
        // idx is transport-internal and not serialized
        assert_eq!(back.idx, 0);
    }
}
