//! Title, thumbnail and resolution lookup for a watch URL.
//!
//! The title comes from the first source that yields one:
//! 1. the oEmbed endpoint,
//! 2. the watch page (embedded player response, then `og:title`, then `<title>`),
//! 3. the extractor probe.
//!
//! Thumbnail and heights always come from the probe. Nothing here fails:
//! every lookup error degrades to an empty value or the fallback ladder.

use lazy_regex::{regex, regex_captures};
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE};
use select::document::Document;
use select::predicate::{Attr, Name};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::url::normalize_or_original;
use crate::download::options::{image_resolution_labels, video_resolution_labels, FALLBACK_HEIGHTS};
use crate::download::source::{MediaExtractor, VideoInfo};

/// What the UI header and resolution pickers need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    /// Empty when no source produced a title
    pub title: String,
    pub thumbnail: Option<String>,
    /// Tallest first, never empty
    pub heights: Vec<u32>,
}

impl VideoDetails {
    pub fn video_labels(&self) -> Vec<String> {
        video_resolution_labels(&self.heights)
    }

    pub fn image_labels(&self) -> Vec<String> {
        image_resolution_labels(&self.heights)
    }
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
}

/// Looks up video metadata from the network and the extractor.
#[derive(Clone)]
pub struct MetadataResolver {
    client: reqwest::Client,
    oembed_endpoint: String,
    extractor: Arc<dyn MediaExtractor>,
}

impl MetadataResolver {
    pub fn new(extractor: Arc<dyn MediaExtractor>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config::metadata::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            oembed_endpoint: config::OEMBED_ENDPOINT.clone(),
            extractor,
        })
    }

    /// Overrides the oEmbed endpoint (tests point it at a local server).
    pub fn with_oembed_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.oembed_endpoint = endpoint.into();
        self
    }

    /// Title, thumbnail and heights for `url`. Never fails.
    pub async fn resolve(&self, url: &str) -> VideoDetails {
        let url = normalize_or_original(url);
        let (exact, probe) = tokio::join!(self.exact_title(&url), self.probe(&url));

        let probe = probe.unwrap_or_default();
        let mut heights = probe.available_heights();
        if heights.is_empty() {
            heights = FALLBACK_HEIGHTS.to_vec();
        }
        let title = exact
            .or_else(|| probe.title.clone().filter(|t| !t.trim().is_empty()))
            .unwrap_or_default();

        VideoDetails {
            title,
            thumbnail: probe.thumbnail,
            heights,
        }
    }

    /// Title from oEmbed, else from the watch page.
    pub async fn exact_title(&self, url: &str) -> Option<String> {
        if let Some(title) = self.oembed_title(url).await {
            return Some(title);
        }
        self.scraped_title(url).await
    }

    pub async fn oembed_title(&self, url: &str) -> Option<String> {
        let request_url = format!(
            "{}?url={}&format=json",
            self.oembed_endpoint,
            urlencoding::encode(url)
        );
        let request = self.client.get(&request_url).timeout(config::metadata::oembed_timeout());
        let response = fetch_ok(request)
            .await
            .map_err(|e| log::debug!("oEmbed lookup for {} failed: {}", url, e))
            .ok()?;
        let body: OEmbedResponse = response.json().await.ok()?;
        body.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }

    pub async fn scraped_title(&self, url: &str) -> Option<String> {
        let request = self
            .client
            .get(url)
            .header(COOKIE, config::metadata::CONSENT_COOKIE)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .timeout(config::metadata::page_timeout());
        let response = fetch_ok(request)
            .await
            .map_err(|e| log::debug!("Watch page {} failed: {}", url, e))
            .ok()?;
        let html = response.text().await.ok()?;
        title_from_html(&html)
    }

    /// Metadata-only extractor probe, `None` on any failure.
    pub async fn probe(&self, url: &str) -> Option<VideoInfo> {
        let extractor = Arc::clone(&self.extractor);
        let owned_url = url.to_string();
        match tokio::task::spawn_blocking(move || extractor.probe(&owned_url)).await {
            Ok(Ok(info)) => Some(info),
            Ok(Err(e)) => {
                log::warn!("Probe of {} failed: {}", url, e);
                None
            }
            Err(e) => {
                log::error!("Probe task for {} panicked: {}", url, e);
                None
            }
        }
    }
}

/// Sends `request`, turning a non-2xx answer into [`AppError::HttpStatus`].
pub(crate) async fn fetch_ok(request: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::HttpStatus(status));
    }
    Ok(response)
}

/// Title embedded in a watch page.
pub fn title_from_html(html: &str) -> Option<String> {
    player_response_title(html)
        .or_else(|| {
            let document = Document::from(html);
            let og = document
                .find(Attr("property", "og:title"))
                .next()
                .and_then(|n| n.attr("content"))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            og.or_else(|| {
                document
                    .find(Name("title"))
                    .next()
                    .map(|n| regex!(r"\s+-\s+YouTube$").replace(n.text().trim(), "").to_string())
                    .filter(|t| !t.is_empty())
            })
        })
}

fn player_response_title(html: &str) -> Option<String> {
    let blob = regex_captures!(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.*?\})\s*;\s*</script", html)
        .map(|(_, json)| json)
        .or_else(|| regex_captures!(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.*?\})\s*;", html).map(|(_, json)| json))?;
    let value: serde_json::Value = serde_json::from_str(blob).ok()?;
    value["videoDetails"]["title"]
        .as_str()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
