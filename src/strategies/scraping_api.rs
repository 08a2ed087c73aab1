//! Third-party scraping API backend, authenticated through the token
//! provider side-service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ExtractionOptions, TranscriptPayload, TranscriptStrategy};
use crate::captions::{self, TranscriptSegment};
use crate::classify::{ErrorKind, ExtractionError};
use crate::token::TokenProvider;

#[derive(Debug, Deserialize)]
struct ScrapedTranscript {
    #[serde(default)]
    segments: Vec<ScrapedSegment>,
}

#[derive(Debug, Deserialize)]
struct ScrapedSegment {
    /// Start offset in seconds
    start: f64,
    /// Duration in seconds, when known
    #[serde(default)]
    duration: Option<f64>,
    text: String,
}

pub struct ScrapingApiStrategy {
    client: reqwest::Client,
    enabled: bool,
    endpoint: String,
    token_provider: Arc<TokenProvider>,
}

impl ScrapingApiStrategy {
    pub fn new(enabled: bool, endpoint: impl Into<String>, token_provider: Arc<TokenProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled,
            endpoint: endpoint.into(),
            token_provider,
        }
    }

    fn to_segments(scraped: ScrapedTranscript) -> Vec<TranscriptSegment> {
        let mut segments: Vec<TranscriptSegment> = scraped
            .segments
            .into_iter()
            .filter_map(|segment| {
                let text = segment.text.trim();
                if text.is_empty() {
                    return None;
                }
                let start_ms = (segment.start.max(0.0) * 1000.0).round() as u64;
                let end_ms = segment
                    .duration
                    .map(|d| start_ms + (d.max(0.0) * 1000.0).round() as u64);
                Some(TranscriptSegment::new(start_ms, end_ms, text))
            })
            .collect();
        segments.sort_by_key(|segment| segment.start_ms);
        captions::dedup_rolling(segments)
    }
}

#[async_trait]
impl TranscriptStrategy for ScrapingApiStrategy {
    fn name(&self) -> &'static str {
        "scraping_api"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.endpoint.is_empty()
    }

    async fn is_available(&self) -> bool {
        self.token_provider.health_check().await
    }

    async fn extract(
        &self,
        video_id: &str,
        options: &ExtractionOptions,
    ) -> Result<TranscriptPayload, ExtractionError> {
        let token = self.token_provider.get_token().await?;

        let url = format!("{}/transcript", self.endpoint.trim_end_matches('/'));
        let languages = options.preferred_languages.join(",");
        let response = self
            .client
            .get(&url)
            .query(&[("video_id", video_id), ("languages", languages.as_str())])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| ExtractionError::from_message(format!("scraping api request failed: {}", err)))?;

        let status = response.status();
        match status.as_u16() {
            200 => {}
            401 => {
                // The cached token is stale; force a refresh for the next call.
                self.token_provider.invalidate_cache().await;
                return Err(ExtractionError::new(
                    ErrorKind::ProviderTokenError,
                    "scraping api rejected the provider token",
                ));
            }
            404 => {
                return Err(ExtractionError::new(
                    ErrorKind::NoCaptions,
                    "scraping api has no transcript for this video",
                ));
            }
            429 => {
                return Err(ExtractionError::new(
                    ErrorKind::RateLimited,
                    "scraping api rate limit hit",
                ));
            }
            _ => {
                return Err(ExtractionError::from_message(format!(
                    "scraping api returned HTTP {}",
                    status
                )));
            }
        }

        let scraped: ScrapedTranscript = response.json().await.map_err(|err| {
            ExtractionError::new(
                ErrorKind::ParseError,
                format!("scraping api response did not parse: {}", err),
            )
        })?;

        let segments = Self::to_segments(scraped);
        if segments.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::NoCaptions,
                "scraping api returned an empty transcript",
            ));
        }

        Ok(TranscriptPayload {
            text: captions::render(&segments, options.include_timestamps),
            segment_count: segments.len(),
        })
    }
}
