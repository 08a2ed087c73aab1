//! Official data API backend. Lists caption tracks through the captions
//! endpoint and downloads the selected one as SRT. Requires an API key;
//! without one the strategy stays disabled.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ExtractionOptions, TranscriptPayload, TranscriptStrategy};
use crate::captions::{self, CaptionFormat};
use crate::classify::{ErrorKind, ExtractionError};

const CAPTIONS_URL: &str = "https://www.googleapis.com/youtube/v3/captions";

#[derive(Debug, Deserialize)]
struct CaptionList {
    #[serde(default)]
    items: Vec<CaptionItem>,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    id: String,
    snippet: CaptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionSnippet {
    language: String,
    #[serde(default)]
    track_kind: Option<String>,
}

impl CaptionItem {
    fn is_auto_generated(&self) -> bool {
        self.snippet.track_kind.as_deref() == Some("asr")
    }
}

pub struct DataApiStrategy {
    client: reqwest::Client,
    enabled: bool,
    api_key: Option<String>,
}

impl DataApiStrategy {
    pub fn new(enabled: bool, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled,
            api_key,
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ExtractionError {
        match status.as_u16() {
            403 if body.contains("quota") => ExtractionError::new(
                ErrorKind::RateLimited,
                "data api quota exceeded",
            ),
            403 => ExtractionError::new(
                ErrorKind::ProviderTokenError,
                "data api rejected the configured key",
            ),
            404 => ExtractionError::new(
                ErrorKind::VideoUnavailable,
                "data api reports the video does not exist",
            ),
            429 => ExtractionError::new(ErrorKind::RateLimited, "data api rate limit hit"),
            _ => ExtractionError::from_message(format!("data api returned HTTP {}", status)),
        }
    }

    fn select_item<'a>(
        items: &'a [CaptionItem],
        preferred_languages: &[String],
    ) -> Option<&'a CaptionItem> {
        for language in preferred_languages {
            let candidates: Vec<&CaptionItem> = if language == "*" {
                items.iter().collect()
            } else {
                items
                    .iter()
                    .filter(|item| {
                        item.snippet.language == *language
                            || item.snippet.language.starts_with(&format!("{}-", language))
                    })
                    .collect()
            };
            if let Some(item) = candidates
                .iter()
                .copied()
                .find(|item| !item.is_auto_generated())
                .or_else(|| candidates.first().copied())
            {
                return Some(item);
            }
        }
        None
    }

    async fn list_tracks(
        &self,
        video_id: &str,
        api_key: &str,
    ) -> Result<Vec<CaptionItem>, ExtractionError> {
        let response = self
            .client
            .get(CAPTIONS_URL)
            .query(&[("part", "snippet"), ("videoId", video_id), ("key", api_key)])
            .send()
            .await
            .map_err(|err| ExtractionError::from_message(format!("data api request failed: {}", err)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ExtractionError::from_message(format!("data api body read failed: {}", err)))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        let list: CaptionList = serde_json::from_str(&body).map_err(|err| {
            ExtractionError::new(
                ErrorKind::ParseError,
                format!("caption list did not parse: {}", err),
            )
        })?;
        Ok(list.items)
    }

    async fn download_track(
        &self,
        track_id: &str,
        api_key: &str,
    ) -> Result<String, ExtractionError> {
        let url = format!("{}/{}", CAPTIONS_URL, urlencoding::encode(track_id));
        let response = self
            .client
            .get(&url)
            .query(&[("tfmt", "srt"), ("key", api_key)])
            .send()
            .await
            .map_err(|err| ExtractionError::from_message(format!("caption download failed: {}", err)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ExtractionError::from_message(format!("caption body read failed: {}", err)))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl TranscriptStrategy for DataApiStrategy {
    fn name(&self) -> &'static str {
        "data_api"
    }

    fn priority(&self) -> u32 {
        40
    }

    fn is_enabled(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }

    async fn extract(
        &self,
        video_id: &str,
        options: &ExtractionOptions,
    ) -> Result<TranscriptPayload, ExtractionError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ExtractionError::new(ErrorKind::ProviderTokenError, "data api key not configured")
        })?;

        let items = self.list_tracks(video_id, api_key).await?;
        if items.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::NoCaptions,
                "data api lists no caption tracks",
            ));
        }

        let item = Self::select_item(&items, &options.preferred_languages).ok_or_else(|| {
            ExtractionError::new(
                ErrorKind::NoCaptions,
                format!(
                    "no data api track for languages [{}]",
                    options.preferred_languages.join(", ")
                ),
            )
        })?;

        tracing::debug!(video_id, language = %item.snippet.language, "downloading caption track via data api");

        let srt = self.download_track(&item.id, api_key).await?;
        let segments = captions::normalize(CaptionFormat::Srt, &srt);
        if segments.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::ParseError,
                "downloaded caption track parsed to zero segments",
            ));
        }

        Ok(TranscriptPayload {
            text: captions::render(&segments, options.include_timestamps),
            segment_count: segments.len(),
        })
    }
}
