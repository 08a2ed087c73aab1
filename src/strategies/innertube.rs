//! Embedded player-API backend.
//!
//! Talks to the player endpoint directly with an Android client context,
//! which returns the caption track list as proper JSON instead of a page
//! scrape. Holding full player responses in memory is the heaviest thing
//! this crate does, so registration is gated on memory headroom.

use async_trait::async_trait;
use serde::Deserialize;

use super::{select_caption_track, CaptionTrack, ExtractionOptions, TranscriptPayload, TranscriptStrategy};
use crate::captions::{self, CaptionFormat};
use crate::classify::{ErrorKind, ExtractionError};
use crate::utils;

const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "20.10.38";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
    video_details: Option<VideoDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    is_live_content: Option<bool>,
}

pub struct InnertubeStrategy {
    client: reqwest::Client,
    enabled: bool,
    min_free_memory_mb: u64,
}

impl InnertubeStrategy {
    pub fn new(enabled: bool, min_free_memory_mb: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled,
            min_free_memory_mb,
        }
    }

    /// Memory headroom gate; unknown headroom passes.
    pub fn has_memory_headroom(min_free_memory_mb: u64) -> bool {
        match utils::available_memory_mb() {
            Some(available) => available >= min_free_memory_mb,
            None => true,
        }
    }

    async fn fetch_player_response(&self, video_id: &str) -> Result<PlayerResponse, ExtractionError> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": CLIENT_NAME,
                    "clientVersion": CLIENT_VERSION,
                    "androidSdkVersion": 30,
                }
            },
            "videoId": video_id,
        });

        let response = self
            .client
            .post(PLAYER_URL)
            .json(&body)
            .send()
            .await
            .map_err(|err| ExtractionError::from_message(format!("player request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::from_message(format!(
                "player endpoint returned HTTP {}",
                status
            )));
        }

        response.json().await.map_err(|err| {
            ExtractionError::new(
                ErrorKind::ParseError,
                format!("player response did not parse: {}", err),
            )
        })
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<String, ExtractionError> {
        let response = self
            .client
            .get(&track.base_url)
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
impl TranscriptStrategy for InnertubeStrategy {
    fn name(&self) -> &'static str {
        "innertube"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn is_available(&self) -> bool {
        Self::has_memory_headroom(self.min_free_memory_mb)
    }

    async fn extract(
        &self,
        video_id: &str,
        options: &ExtractionOptions,
    ) -> Result<TranscriptPayload, ExtractionError> {
        let player = self.fetch_player_response(video_id).await?;
        check_playability(&player)?;

        let tracks = player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        let track = select_caption_track(&tracks, &options.preferred_languages).ok_or_else(|| {
            ExtractionError::new(
                ErrorKind::NoCaptions,
                format!(
                    "player response has no caption track for languages [{}]",
                    options.preferred_languages.join(", ")
                ),
            )
        })?;

        tracing::debug!(video_id, language = %track.language_code, "fetching caption track via player api");

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

/// Map the player's playability verdict to a typed failure.
fn check_playability(player: &PlayerResponse) -> Result<(), ExtractionError> {
    if let Some(details) = &player.video_details {
        if details.is_live_content == Some(true) {
            return Err(ExtractionError::new(
                ErrorKind::VideoLive,
                "video is a live stream",
            ));
        }
    }

    let Some(status) = &player.playability_status else {
        return Ok(());
    };
    let reason = status.reason.clone().unwrap_or_default();

    match status.status.as_deref() {
        None | Some("OK") => Ok(()),
        Some("LOGIN_REQUIRED") => {
            if reason.to_lowercase().contains("age") {
                Err(ExtractionError::new(
                    ErrorKind::AgeRestricted,
                    format!("sign-in required: {}", reason),
                ))
            } else {
                Err(ExtractionError::new(
                    ErrorKind::VideoPrivate,
                    format!("video is private: {}", reason),
                ))
            }
        }
        Some("LIVE_STREAM_OFFLINE") => Err(ExtractionError::new(
            ErrorKind::VideoLive,
            format!("live stream has not finished: {}", reason),
        )),
        Some("UNPLAYABLE") | Some("ERROR") => Err(ExtractionError::new(
            ErrorKind::VideoUnavailable,
            format!("video unavailable: {}", reason),
        )),
        Some(other) => Err(ExtractionError::new(
            ErrorKind::Unknown,
            format!("unexpected playability status {}: {}", other, reason),
        )),
    }
}
