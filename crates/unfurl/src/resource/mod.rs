// ABOUTME: Resource handling module for fetching the leading chunk of web resources.
// ABOUTME: Handles bounded HTTP fetching, the twitter deflate workaround, and charset decoding.

use std::collections::HashMap;
use std::io::Read;

use futures::StreamExt;
use url::Url;

use crate::error::UnfurlError;

/// Default ceiling on how much of a response body is read (64 KiB).
///
/// Metadata tags normally occur early in an HTML document, so a partial read
/// is expected for large pages and bounds both memory and time.
pub const DEFAULT_MAX_BODY_CHUNK_SIZE: usize = 64 * 1024;

/// An in-memory snapshot of a fetched resource: the truncated body, the final
/// URL after redirects, and the server-reported content type. Created per
/// fetch attempt, consumed synchronously by the classifier and extractor,
/// never cached or shared across requests.
#[derive(Debug, Clone)]
pub struct PageChunk {
    pub data: Vec<u8>,
    pub url: Url,
    pub content_type: String,
}

impl PageChunk {
    /// Decode the chunk as text, honoring a charset in the content-type
    /// header and falling back to detection.
    pub fn text(&self) -> String {
        decode_body(&self.data, Some(&self.content_type))
    }
}

/// Fetch the first chunk of the resource at `url`.
///
/// Issues one GET with the configured extra headers. HTTP status >= 400 is a
/// terminal error for this URL; no retry is performed. At most
/// `max_chunk_size` bytes of the body are read.
pub async fn fetch_chunk(
    client: &reqwest::Client,
    url: &str,
    headers: &HashMap<String, String>,
    max_chunk_size: usize,
) -> Result<PageChunk, UnfurlError> {
    if url.is_empty() {
        return Err(UnfurlError::invalid_url(url, "fetch_chunk", None));
    }
    Url::parse(url).map_err(|e| {
        UnfurlError::invalid_url(
            url,
            "fetch_chunk",
            Some(anyhow::anyhow!("malformed URL: {}", e)),
        )
    })?;

    let mut request = client.get(url);
    for (key, value) in headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            UnfurlError::timeout(url, "fetch_chunk", Some(anyhow::anyhow!("{}", e)))
        } else {
            UnfurlError::fetch(url, "fetch_chunk", Some(anyhow::anyhow!("request failed: {}", e)))
        }
    })?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(UnfurlError::fetch(
            url,
            "fetch_chunk",
            Some(anyhow::anyhow!("bad status: {}", status)),
        ));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    // Some twitter.com endpoints send unsolicited zlib-wrapped bodies with
    // Content-Encoding: deflate, violating the RFC. Detect and unwrap. A
    // client with automatic deflate decoding strips the header before we see
    // it, so this only fires for injected clients without that feature.
    let needs_zlib = response
        .headers()
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("deflate"))
        .unwrap_or(false)
        && final_url
            .host_str()
            .map(|h| h == "twitter.com" || h.ends_with(".twitter.com"))
            .unwrap_or(false);

    let raw = read_limited(response, max_chunk_size).await.map_err(|e| {
        UnfurlError::fetch(
            url,
            "fetch_chunk",
            Some(anyhow::anyhow!("failed to read body: {}", e)),
        )
    })?;

    let data = if needs_zlib {
        inflate_zlib(&raw, max_chunk_size).map_err(|e| {
            UnfurlError::fetch(
                url,
                "fetch_chunk",
                Some(anyhow::anyhow!("deflate workaround failed: {}", e)),
            )
        })?
    } else {
        raw
    };

    Ok(PageChunk {
        data,
        url: final_url,
        content_type,
    })
}

/// Read at most `limit` bytes from a response body without buffering the rest.
async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut data = Vec::with_capacity(limit.min(16 * 1024));
    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let bytes = item?;
        let remaining = limit - data.len();
        if bytes.len() >= remaining {
            data.extend_from_slice(&bytes[..remaining]);
            break;
        }
        data.extend_from_slice(&bytes);
    }
    Ok(data)
}

/// Decompress a zlib stream, reading at most `limit` decompressed bytes.
fn inflate_zlib(raw: &[u8], limit: usize) -> std::io::Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(raw).take(limit as u64);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Decode body bytes to a String using charset from content-type header or detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from a Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn create_test_client() -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent("test-agent")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_chunk_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html><head><title>hi</title></head></html>");
        });

        let client = create_test_client();
        let chunk = fetch_chunk(
            &client,
            &server.url("/page"),
            &HashMap::new(),
            DEFAULT_MAX_BODY_CHUNK_SIZE,
        )
        .await
        .expect("fetch should succeed");
        mock.assert();

        assert_eq!(chunk.content_type, "text/html; charset=utf-8");
        assert!(chunk.text().contains("<title>hi</title>"));
    }

    #[tokio::test]
    async fn test_fetch_chunk_truncates_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200)
                .header("content-type", "text/html")
                .body("x".repeat(4096));
        });

        let client = create_test_client();
        let chunk = fetch_chunk(&client, &server.url("/big"), &HashMap::new(), 100)
            .await
            .expect("fetch should succeed");

        assert_eq!(chunk.data.len(), 100);
    }

    #[tokio::test]
    async fn test_fetch_chunk_bad_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not found");
        });

        let client = create_test_client();
        let err = fetch_chunk(
            &client,
            &server.url("/missing"),
            &HashMap::new(),
            DEFAULT_MAX_BODY_CHUNK_SIZE,
        )
        .await
        .expect_err("should fail on 404");
        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn test_fetch_chunk_sends_extra_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/page")
                .header("x-forwarded-proto", "https");
            then.status(200).body("ok");
        });

        let client = create_test_client();
        let mut headers = HashMap::new();
        headers.insert("X-Forwarded-Proto".to_string(), "https".to_string());
        fetch_chunk(
            &client,
            &server.url("/page"),
            &headers,
            DEFAULT_MAX_BODY_CHUNK_SIZE,
        )
        .await
        .expect("fetch should succeed");
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_chunk_invalid_url() {
        let client = create_test_client();
        let err = fetch_chunk(&client, "not a url", &HashMap::new(), 100)
            .await
            .expect_err("should reject malformed URL");
        assert!(err.is_invalid_url());
    }

    #[tokio::test]
    async fn test_fetch_chunk_follows_redirect() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(301).header("location", server.url("/new"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/new");
            then.status(200)
                .header("content-type", "text/html")
                .body("<title>moved</title>");
        });

        let client = create_test_client();
        let chunk = fetch_chunk(
            &client,
            &server.url("/old"),
            &HashMap::new(),
            DEFAULT_MAX_BODY_CHUNK_SIZE,
        )
        .await
        .expect("fetch should succeed");

        assert!(chunk.url.as_str().ends_with("/new"));
    }

    #[test]
    fn test_inflate_zlib_roundtrip() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello deflate").unwrap();
        let compressed = encoder.finish().unwrap();

        let out = inflate_zlib(&compressed, 1024).unwrap();
        assert_eq!(out, b"hello deflate");
    }

    #[test]
    fn test_extract_charset() {
        assert_eq!(
            extract_charset("text/html; charset=utf-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            extract_charset("text/html; charset=\"windows-1251\""),
            Some("windows-1251".to_string())
        );
        assert_eq!(extract_charset("text/html"), None);
    }

    #[test]
    fn test_decode_body_charset_hint() {
        // windows-1251 encoded Cyrillic "да"
        let body: &[u8] = &[0xE4, 0xE0];
        let decoded = decode_body(body, Some("text/html; charset=windows-1251"));
        assert_eq!(decoded, "да");
    }

    #[test]
    fn test_decode_body_detection_fallback() {
        let decoded = decode_body("plain ascii".as_bytes(), None);
        assert_eq!(decoded, "plain ascii");
    }
}
