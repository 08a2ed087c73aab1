//! Primary backend: scrape the caption track list out of the public watch
//! page, then fetch the selected track's timed-text XML.

use async_trait::async_trait;

use super::{select_caption_track, CaptionTrack, ExtractionOptions, TranscriptPayload, TranscriptStrategy};
use crate::captions::{self, CaptionFormat};
use crate::classify::{ErrorKind, ExtractionError};
use crate::resilience::{with_retry, RetryPolicy};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub struct WatchPageStrategy {
    client: reqwest::Client,
    enabled: bool,
    retry: RetryPolicy,
}

impl WatchPageStrategy {
    pub fn new(enabled: bool, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled,
            retry,
        }
    }

    async fn fetch_page(&self, video_id: &str) -> Result<String, ExtractionError> {
        let url = format!("{}{}", WATCH_URL, video_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|err| ExtractionError::from_message(format!("watch page fetch failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::from_message(format!(
                "watch page returned HTTP {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|err| ExtractionError::from_message(format!("watch page body read failed: {}", err)))
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<String, ExtractionError> {
        let response = self
            .client
            .get(&track.base_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|err| ExtractionError::from_message(format!("caption track fetch failed: {}", err)))?;

        if !response.status().is_success() {
            return Err(ExtractionError::from_message(format!(
                "caption track returned HTTP {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|err| ExtractionError::from_message(format!("caption track body read failed: {}", err)))
    }
}

#[async_trait]
impl TranscriptStrategy for WatchPageStrategy {
    fn name(&self) -> &'static str {
        "watch_page"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn extract(
        &self,
        video_id: &str,
        options: &ExtractionOptions,
    ) -> Result<TranscriptPayload, ExtractionError> {
        let html = with_retry(&self.retry, || self.fetch_page(video_id)).await?;

        let tracks = parse_caption_tracks(&html)?;
        let track = select_caption_track(&tracks, &options.preferred_languages).ok_or_else(|| {
            ExtractionError::new(
                ErrorKind::NoCaptions,
                format!(
                    "no caption track matches languages [{}]",
                    options.preferred_languages.join(", ")
                ),
            )
        })?;

        tracing::debug!(
            video_id,
            language = %track.language_code,
            auto = track.is_auto_generated(),
            "fetching caption track from watch page"
        );

        let xml = self.fetch_track(track).await?;
        let segments = captions::normalize(CaptionFormat::TimedTextXml, &xml);
        if segments.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::ParseError,
                "caption track parsed to zero segments",
            ));
        }

        Ok(TranscriptPayload {
            text: captions::render(&segments, options.include_timestamps),
            segment_count: segments.len(),
        })
    }
}

/// Pull the `"captionTracks": [...]` JSON island out of the watch page, or
/// map the page's playability markers to a typed failure.
fn parse_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>, ExtractionError> {
    if let Some(island) = extract_json_array(html, "\"captionTracks\":") {
        return serde_json::from_str(island).map_err(|err| {
            ExtractionError::new(
                ErrorKind::ParseError,
                format!("caption track list did not parse: {}", err),
            )
        });
    }

    if html.contains("\"status\":\"LOGIN_REQUIRED\"") {
        if html.contains("confirm your age") || html.contains("age-restricted") {
            return Err(ExtractionError::new(
                ErrorKind::AgeRestricted,
                "watch page requires sign-in to confirm age",
            ));
        }
        return Err(ExtractionError::new(
            ErrorKind::VideoPrivate,
            "watch page reports this video is private",
        ));
    }
    if html.contains("\"isLiveContent\":true") || html.contains("\"isLive\":true") {
        return Err(ExtractionError::new(
            ErrorKind::VideoLive,
            "watch page reports a live stream",
        ));
    }
    if html.contains("\"status\":\"ERROR\"") {
        return Err(ExtractionError::new(
            ErrorKind::VideoUnavailable,
            "watch page reports the video is unavailable",
        ));
    }

    Err(ExtractionError::new(
        ErrorKind::NoCaptions,
        "watch page carries no caption tracks",
    ))
}

/// Extract a balanced JSON array starting right after `marker`.
fn extract_json_array<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let open = rest.find('[')?;
    let bytes = rest.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
