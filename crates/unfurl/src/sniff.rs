// ABOUTME: Byte-prefix MIME sniffing and coarse media-category classification.
// ABOUTME: Maps leading bytes of a fetched chunk to image/video/website categories.

use crate::result::MediaType;

/// How many leading bytes are considered when sniffing, mirroring the 512
/// byte window of Go's http.DetectContentType.
const SNIFF_LEN: usize = 512;

/// Sniff the MIME type of a resource from its leading bytes.
///
/// Declared headers are not trusted; only the byte prefix decides. Returns
/// "application/octet-stream" when nothing matches.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some(mime) = match_magic(data) {
        return mime;
    }

    // Strip a UTF-8 BOM and leading whitespace before looking for HTML tags.
    let trimmed = data.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(data);
    let trimmed = skip_ws(trimmed);
    if looks_like_html(trimmed) {
        return "text/html; charset=utf-8";
    }

    if !data.iter().any(|&b| is_binary_byte(b)) {
        return "text/plain; charset=utf-8";
    }

    "application/octet-stream"
}

/// Classify a sniffed MIME type into a coarse media category.
///
/// image/* resources are their own preview; video/* gets no further
/// extraction; text/* triggers the metadata extractor chain; anything else
/// leaves the category unset.
pub fn classify(mime: &str) -> MediaType {
    if mime.starts_with("image/") {
        MediaType::Image
    } else if mime.starts_with("video/") {
        MediaType::Video
    } else if mime.starts_with("text/") {
        MediaType::Website
    } else {
        MediaType::Unknown
    }
}

fn match_magic(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if data.starts_with(b"\xFF\xD8\xFF") {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        if &data[8..12] == b"WEBP" {
            return Some("image/webp");
        }
        if &data[8..11] == b"AVI" {
            return Some("video/avi");
        }
    }
    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }
    if data.starts_with(b"\x00\x00\x01\x00") {
        return Some("image/x-icon");
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    if data.starts_with(b"\x1A\x45\xDF\xA3") {
        return Some("video/webm");
    }
    None
}

fn skip_ws(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C))
        .unwrap_or(data.len());
    &data[start..]
}

fn looks_like_html(data: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        b"<!doctype html",
        b"<html",
        b"<head",
        b"<body",
        b"<title",
        b"<script",
        b"<iframe",
        b"<h1",
        b"<div",
        b"<p>",
        b"<!--",
    ];
    let lower: Vec<u8> = data
        .iter()
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    SIGNATURES.iter().any(|sig| lower.starts_with(sig))
}

fn is_binary_byte(b: u8) -> bool {
    // Control bytes other than common text whitespace/escape characters.
    b <= 0x08 || b == 0x0B || (0x0E..=0x1A).contains(&b) || (0x1C..=0x1F).contains(&b)
}
