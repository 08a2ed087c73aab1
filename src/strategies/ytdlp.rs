//! External downloader backend: drive yt-dlp in subtitle-only mode and
//! normalize whatever VTT files it writes.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ExtractionOptions, TranscriptPayload, TranscriptStrategy};
use crate::captions::{self, CaptionFormat};
use crate::classify::{ErrorKind, ExtractionError};
use crate::utils;

pub struct YtdlpStrategy {
    yt_dlp_path: String,
    enabled: bool,
}

impl YtdlpStrategy {
    pub fn new(enabled: bool, yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            enabled,
        }
    }

    /// Map the ordered language preference to a yt-dlp `--sub-langs` value.
    fn sub_langs(options: &ExtractionOptions) -> String {
        if options.preferred_languages.iter().any(|lang| lang == "*") {
            return "all".to_string();
        }
        options
            .preferred_languages
            .iter()
            .flat_map(|lang| [lang.clone(), format!("{}-*", lang)])
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Pick the subtitle file best matching the language preference.
    fn pick_subtitle_file(files: &[PathBuf], preferred: &[String]) -> Option<PathBuf> {
        for language in preferred {
            if language == "*" {
                break;
            }
            let marker = format!(".{}", language);
            if let Some(path) = files.iter().find(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().contains(&marker))
                    .unwrap_or(false)
            }) {
                return Some(path.clone());
            }
        }
        files.first().cloned()
    }
}

#[async_trait]
impl TranscriptStrategy for YtdlpStrategy {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    fn priority(&self) -> u32 {
        30
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn is_available(&self) -> bool {
        utils::check_command_available(&self.yt_dlp_path).await
    }

    async fn extract(
        &self,
        video_id: &str,
        options: &ExtractionOptions,
    ) -> Result<TranscriptPayload, ExtractionError> {
        let workdir = tempfile::TempDir::new().map_err(ExtractionError::unexpected)?;
        let output_template = workdir.path().join("%(id)s.%(ext)s");
        let url = format!("https://www.youtube.com/watch?v={}", video_id);

        tracing::debug!(video_id, "running yt-dlp in subtitle-only mode");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-format",
                "vtt",
                "--sub-langs",
                &Self::sub_langs(options),
                "--no-playlist",
                "--output",
                &output_template.to_string_lossy(),
                &url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(ExtractionError::unexpected)?;

        if !output.status.success() {
            // yt-dlp reports "Private video", "Video unavailable", rate
            // limiting and the rest on stderr; the classifier understands
            // that wording directly.
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::from_message(format!(
                "yt-dlp failed: {}",
                stderr.trim()
            )));
        }

        let mut subtitle_files: Vec<PathBuf> = fs_err::read_dir(workdir.path())
            .map_err(ExtractionError::unexpected)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|ext| ext == "vtt").unwrap_or(false))
            .collect();
        subtitle_files.sort();

        if subtitle_files.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::NoCaptions,
                "yt-dlp produced no subtitle files",
            ));
        }

        let chosen = Self::pick_subtitle_file(&subtitle_files, &options.preferred_languages)
            .unwrap_or_else(|| subtitle_files[0].clone());
        let content = fs_err::read_to_string(&chosen).map_err(ExtractionError::unexpected)?;

        let segments = captions::normalize(CaptionFormat::Vtt, &content);
        if segments.is_empty() {
            return Err(ExtractionError::new(
                ErrorKind::ParseError,
                format!("subtitle file {} parsed to zero segments", chosen.display()),
            ));
        }

        Ok(TranscriptPayload {
            text: captions::render(&segments, options.include_timestamps),
            segment_count: segments.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_langs_wildcard_requests_all() {
        let options = ExtractionOptions {
            preferred_languages: vec!["en".to_string(), "*".to_string()],
            ..Default::default()
        };
        assert_eq!(YtdlpStrategy::sub_langs(&options), "all");
    }

    #[test]
    fn test_sub_langs_expands_regional_variants() {
        let options = ExtractionOptions {
            preferred_languages: vec!["en".to_string(), "de".to_string()],
            ..Default::default()
        };
        assert_eq!(YtdlpStrategy::sub_langs(&options), "en,en-*,de,de-*");
    }

    #[test]
    fn test_pick_subtitle_file_prefers_language_match() {
        let files = vec![
            PathBuf::from("/tmp/abc.de.vtt"),
            PathBuf::from("/tmp/abc.en.vtt"),
        ];
        let chosen =
            YtdlpStrategy::pick_subtitle_file(&files, &["en".to_string()]).unwrap();
        assert_eq!(chosen, PathBuf::from("/tmp/abc.en.vtt"));
    }

    #[test]
    fn test_pick_subtitle_file_falls_back_to_first() {
        let files = vec![PathBuf::from("/tmp/abc.ja.vtt")];
        let chosen =
            YtdlpStrategy::pick_subtitle_file(&files, &["en".to_string()]).unwrap();
        assert_eq!(chosen, PathBuf::from("/tmp/abc.ja.vtt"));
    }
}
