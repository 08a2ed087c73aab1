use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod data_api;
pub mod innertube;
pub mod scraping_api;
pub mod watch_page;
pub mod ytdlp;

use crate::classify::ExtractionError;

/// Per-request extraction options, merged over service defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Ordered language preference; `*` means "any"
    pub preferred_languages: Vec<String>,

    /// Prefix each transcript line with `[HH:MM:SS]`
    pub include_timestamps: bool,

    /// Per-strategy attempt timeout
    pub timeout_ms: u64,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            preferred_languages: vec!["en".to_string(), "*".to_string()],
            include_timestamps: true,
            timeout_ms: 30_000,
        }
    }
}

/// Static description of a registered strategy, for listing and logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub name: String,
    pub priority: u32,
    pub timeout_ms: u64,
    pub enabled: bool,
}

/// What a successful backend hands back to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptPayload {
    /// Rendered transcript text
    pub text: String,

    /// Number of segments that survived normalization
    pub segment_count: usize,
}

/// One self-contained way of acquiring a transcript.
///
/// Implementations own their transport entirely and translate every expected
/// failure into a typed [`ExtractionError`] before returning; only truly
/// unexpected faults surface as `Unknown`. Strategies are tried in ascending
/// `priority` order (ties keep registration order).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Unique strategy id
    fn name(&self) -> &'static str;

    /// Lower is tried first
    fn priority(&self) -> u32;

    /// Static per-process enablement
    fn is_enabled(&self) -> bool {
        true
    }

    /// Cheap runtime precondition check (tool present, headroom, ...)
    async fn is_available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        video_id: &str,
        options: &ExtractionOptions,
    ) -> Result<TranscriptPayload, ExtractionError>;
}

/// Caption track advertised by a player response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
    #[serde(rename = "kind", default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Auto-generated (speech-recognizer) tracks are marked `kind: "asr"`.
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Pick the caption track best matching the ordered language preference.
///
/// For each preferred language in turn: a manually authored track wins over
/// an auto-generated one; a language-prefix match (e.g. `en` vs `en-US`)
/// counts. The wildcard `*` accepts any track, manual first.
pub(crate) fn select_caption_track<'a>(
    tracks: &'a [CaptionTrack],
    preferred_languages: &[String],
) -> Option<&'a CaptionTrack> {
    for language in preferred_languages {
        let candidates: Vec<&CaptionTrack> = if language == "*" {
            tracks.iter().collect()
        } else {
            tracks
                .iter()
                .filter(|track| {
                    track.language_code == *language
                        || track.language_code.starts_with(&format!("{}-", language))
                })
                .collect()
        };

        if let Some(track) = candidates
            .iter()
            .copied()
            .find(|track| !track.is_auto_generated())
            .or_else(|| candidates.first().copied())
        {
            return Some(track);
        }
    }
    None
}
