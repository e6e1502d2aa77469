// ABOUTME: Post-processing of extracted icon/image URLs: absolutization, scheme validation,
// ABOUTME: and the optional secondary fetch that determines image pixel dimensions.

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::error::UnfurlError;
use crate::resource::fetch_chunk;
use crate::result::UnfurlResult;

/// How much of an image is fetched when probing dimensions. Dimensions live
/// in the format header, though progressive JPEGs can push them further in.
const PROBE_CHUNK_SIZE: usize = 256 * 1024;

/// Collaborator determining the pixel dimensions of an image resource.
#[async_trait]
pub trait ImageProber: Send + Sync {
    async fn probe(
        &self,
        http: &reqwest::Client,
        image_url: &str,
    ) -> Result<(u32, u32), UnfurlError>;
}

/// Default prober: one bounded fetch, then a header-only decode.
#[derive(Debug, Default)]
pub struct HeaderProber;

#[async_trait]
impl ImageProber for HeaderProber {
    async fn probe(
        &self,
        http: &reqwest::Client,
        image_url: &str,
    ) -> Result<(u32, u32), UnfurlError> {
        let chunk = fetch_chunk(http, image_url, &HashMap::new(), PROBE_CHUNK_SIZE).await?;
        let reader = image::ImageReader::new(Cursor::new(chunk.data))
            .with_guessed_format()
            .map_err(|e| {
                UnfurlError::probe(image_url, "probe", Some(anyhow::anyhow!("{}", e)))
            })?;
        reader.into_dimensions().map_err(|e| {
            UnfurlError::probe(
                image_url,
                "probe",
                Some(anyhow::anyhow!("cannot read dimensions: {}", e)),
            )
        })
    }
}

/// Resolve a possibly-relative URL against `base`. Empty input and
/// resolution failures both answer None; the caller leaves the field as-is.
fn absolutize(base: &Url, candidate: &str) -> Option<String> {
    if candidate.is_empty() {
        return None;
    }
    base.join(candidate).ok().map(|u| u.to_string())
}

/// Only http(s) images are acceptable as previews; anything else (data:,
/// javascript:, file:) invalidates the image outright.
fn valid_image_url(url: &str) -> bool {
    matches!(Url::parse(url), Ok(u) if u.scheme() == "http" || u.scheme() == "https")
}

/// Post-process a merged result: absolutize icon and image URLs against the
/// page's final URL, invalidate images with disallowed schemes, and probe
/// dimensions when enabled and still unknown. Never fails the overall result.
pub(crate) async fn post_process(
    result: &mut UnfurlResult,
    base: &Url,
    http: &reqwest::Client,
    prober: Option<&dyn ImageProber>,
) {
    if let Some(abs) = absolutize(base, &result.icon_url) {
        result.icon_url = abs;
    }

    if result.image.is_empty() {
        return;
    }
    match absolutize(base, &result.image) {
        Some(abs) if valid_image_url(&abs) => result.image = abs,
        Some(abs) => {
            warn!(url = %base, image = %abs, "invalid image URL scheme, dropping image");
            result.image = String::new();
            result.image_width = 0;
            result.image_height = 0;
        }
        // Resolution failure leaves the field untouched.
        None => {}
    }

    if result.image.is_empty() {
        return;
    }
    if let Some(prober) = prober {
        if result.image_width == 0 || result.image_height == 0 {
            match prober.probe(http, &result.image).await {
                Ok((width, height)) => {
                    result.image_width = width;
                    result.image_height = height;
                }
                Err(err) => {
                    warn!(image = %result.image, error = %err, "dimension probe failed");
                }
            }
        }
    }
}
