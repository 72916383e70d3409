//! Image Locator Extraction
//!
//! Heuristic extraction of image references from freeform provider output,
//! plus the image-mode provider client that uses it as a text-mode fallback.
//! Extraction runs five independent scans over the same text and unions the
//! matches; a best-effort filter keeps candidates that look like images and
//! falls back to the full candidate set when nothing survives, so callers can
//! still present raw links.

use crate::error::ApiError;
use crate::provider::{build_provider_http_client, ModelEndpointConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

/// Markdown image syntax: `![alt](url)`.
static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(\s*([^)\s]+)[^)]*\)").expect("markdown image regex"));

/// Markdown link syntax: `[text](url)`.
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\(\s*([^)\s]+)[^)]*\)").expect("markdown link regex"));

/// HTML image tag `src` attribute.
static HTML_IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).expect("html img regex")
});

/// Inline data-URL for a fixed set of image MIME subtypes.
static IMAGE_DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:image/(?:png|jpe?g|gif|webp|bmp|svg\+xml);base64,[A-Za-z0-9+/=]+")
        .expect("data url regex")
});

/// Bare http(s) URL.
static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("bare url regex"));

/// Path ends with a known image extension, optionally followed by a query.
static IMAGE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(?:png|jpe?g|gif|webp|bmp|svg|ico)(?:\?\S*)?$").expect("extension regex")
});

/// Query string carries an image-format hint.
static QUERY_FORMAT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[?&](?:format|fmt|ext|type)=(?:png|jpe?g|gif|webp)").expect("query hint regex")
});

/// Path contains a segment suggesting an image or media CDN.
static MEDIA_PATH_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(?:img|image|images|media|photo|photos|picture|pictures|cdn|thumb|thumbnail)s?/")
        .expect("media path regex")
});

/// Extract image locators from freeform text.
///
/// Five independent scans (markdown image, markdown link, HTML `src`, image
/// data-URLs, bare http(s) URLs) are unioned with duplicates collapsed in
/// first-appearance order. When the image-likeness filter leaves nothing, the
/// full unfiltered candidate set is returned instead.
pub fn extract_image_locators(text: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<String> = Vec::new();

    let mut push = |locator: &str| {
        let locator = locator.trim_end_matches(&['.', ',', ';'][..]);
        if !locator.is_empty() && seen.insert(locator.to_string()) {
            candidates.push(locator.to_string());
        }
    };

    for capture in MARKDOWN_IMAGE.captures_iter(text) {
        push(&capture[1]);
    }
    for capture in MARKDOWN_LINK.captures_iter(text) {
        push(&capture[1]);
    }
    for capture in HTML_IMG_SRC.captures_iter(text) {
        push(&capture[1]);
    }
    for found in IMAGE_DATA_URL.find_iter(text) {
        push(found.as_str());
    }
    for found in BARE_URL.find_iter(text) {
        push(found.as_str());
    }

    let filtered: Vec<String> = candidates
        .iter()
        .filter(|candidate| looks_like_image(candidate))
        .cloned()
        .collect();

    if filtered.is_empty() {
        candidates
    } else {
        filtered
    }
}

fn looks_like_image(locator: &str) -> bool {
    locator.starts_with("data:image/")
        || IMAGE_EXTENSION.is_match(locator)
        || QUERY_FORMAT_HINT.is_match(locator)
        || MEDIA_PATH_SEGMENT.is_match(locator)
}

/// Image-generation endpoint response (OpenAI-compatible wire format).
#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
    b64_json: Option<String>,
}

/// Client for the image-mode completion provider.
///
/// Accepts a free-text prompt and returns zero or more image locators.
/// Providers that answer with a structured body are parsed directly; anything
/// else is treated as freeform text and handed to [`extract_image_locators`].
pub struct ImageGenerationClient {
    client: Client,
    endpoint: ModelEndpointConfig,
}

impl ImageGenerationClient {
    pub fn new(endpoint: ModelEndpointConfig) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        Ok(Self { client, endpoint })
    }

    /// Request images for a free-text prompt.
    pub async fn generate(&self, prompt: &str, count: u32) -> Result<Vec<String>, ApiError> {
        let url = format!(
            "{}/images/generations",
            self.endpoint.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.endpoint.model,
            "prompt": prompt,
            "n": count.max(1),
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(crate::provider::map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                401 => ApiError::ProviderAuthFailed(error_text),
                429 => ApiError::ProviderRateLimit(error_text),
                _ => ApiError::ProviderRequestFailed(format!(
                    "Request failed with status {}: {}",
                    status, error_text
                )),
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| ApiError::ParseError(format!("Failed to read response body: {}", e)))?;

        match serde_json::from_str::<ImagesResponse>(&body_text) {
            Ok(parsed) => Ok(parsed
                .data
                .into_iter()
                .filter_map(|datum| match (datum.url, datum.b64_json) {
                    (Some(url), _) => Some(url),
                    (None, Some(b64)) => Some(format!("data:image/png;base64,{}", b64)),
                    (None, None) => None,
                })
                .collect()),
            Err(_) => {
                // Text-mode fallback: the provider answered in prose.
                debug!("image endpoint returned unstructured body, extracting locators");
                Ok(extract_image_locators(&body_text))
            }
        }
    }
}
