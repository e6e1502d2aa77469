// ABOUTME: Candidate URL extraction from free text for the batch request surface.
// ABOUTME: Finds http/https spans, trims trailing punctuation, and caps the batch size.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("URL regex"));

/// Characters that commonly trail a URL in prose but are not part of it.
const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

/// Extract up to `max` http/https URLs from free text, in order of
/// appearance. Extras beyond `max` are silently dropped. Duplicates are kept;
/// the in-flight coordinator handles them downstream.
pub fn parse_urls_max(content: &str, max: usize) -> Vec<String> {
    let mut urls = Vec::new();
    for m in URL_RE.find_iter(content) {
        if urls.len() == max {
            break;
        }
        let candidate = m.as_str().trim_end_matches(TRAILING_PUNCT);
        if Url::parse(candidate).is_ok() {
            urls.push(candidate.to_string());
        }
    }
    urls
}
