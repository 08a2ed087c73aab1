use serde::{Deserialize, Serialize};

pub mod srt;
pub mod timedtext;
pub mod vtt;

/// One timed caption cue after normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in milliseconds
    pub start_ms: u64,

    /// End offset in milliseconds, when the source format carries one
    pub end_ms: Option<u64>,

    /// Trimmed, tag-stripped, entity-decoded cue text (never empty)
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_ms: u64, end_ms: Option<u64>, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }
}

/// Caption format a backend handed us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    TimedTextXml,
    Vtt,
    Srt,
}

/// Parse raw caption content, sort, and collapse rolling repeats.
pub fn normalize(format: CaptionFormat, content: &str) -> Vec<TranscriptSegment> {
    let mut segments = match format {
        CaptionFormat::TimedTextXml => timedtext::parse(content),
        CaptionFormat::Vtt => vtt::parse(content),
        CaptionFormat::Srt => srt::parse(content),
    };
    // Stable sort keeps source order for equal start times.
    segments.sort_by_key(|segment| segment.start_ms);
    dedup_rolling(segments)
}

/// Collapse rolling captions.
///
/// Auto-generated tracks re-emit the same spoken phrase several times with
/// progressively more finalized text. Walking the segments in temporal order:
/// an exact repeat of the previous text is dropped, a strict subset of it is
/// dropped, and a longer continuation replaces the previously emitted entry.
pub fn dedup_rolling(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    let mut output: Vec<TranscriptSegment> = Vec::with_capacity(segments.len());
    let mut last_text = String::new();

    for segment in segments {
        let text = segment.text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        if text == last_text {
            continue;
        }
        if !last_text.is_empty() && (last_text.starts_with(&text) || last_text.ends_with(&text)) {
            continue;
        }
        if !last_text.is_empty() && (text.starts_with(&last_text) || text.ends_with(&last_text)) {
            if let Some(last) = output.last_mut() {
                *last = TranscriptSegment::new(segment.start_ms, segment.end_ms, text.clone());
                last_text = text;
                continue;
            }
        }

        last_text = text.clone();
        output.push(TranscriptSegment::new(segment.start_ms, segment.end_ms, text));
    }

    output
}

/// Render segments to final transcript text, one line per segment.
pub fn render(segments: &[TranscriptSegment], include_timestamps: bool) -> String {
    segments
        .iter()
        .map(|segment| {
            if include_timestamps {
                format!("[{}] {}", format_timestamp(segment.start_ms), segment.text)
            } else {
                segment.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a millisecond offset as zero-padded `HH:MM:SS` (floor to seconds).
pub fn format_timestamp(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Strip markup tags (`<b>`, `<v Speaker>`, `<c.color>`, inline timestamps).
pub(crate) fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Decode the five standard HTML entities.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full cue-text cleanup shared by all three parsers.
pub(crate) fn clean_cue_text(text: &str) -> String {
    collapse_whitespace(&decode_entities(&strip_tags(text)))
}

/// Parse a subtitle timestamp (`HH:MM:SS.mmm`, `H:MM:SS,mmm`, or `MM:SS.mmm`)
/// into milliseconds.
pub(crate) fn parse_timestamp(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(':').collect();
    let (hours, minutes, seconds_part) = match parts.as_slice() {
        [h, m, s] => ((*h).parse::<u64>().ok()?, (*m).parse::<u64>().ok()?, *s),
        [m, s] => (0, (*m).parse::<u64>().ok()?, *s),
        _ => return None,
    };

    let normalized = seconds_part.replace(',', ".");
    let mut seconds_split = normalized.splitn(2, '.');
    let seconds: u64 = seconds_split.next()?.parse().ok()?;
    let millis: u64 = match seconds_split.next() {
        Some(frac) if !frac.is_empty() => {
            // Pad or truncate the fraction to exactly three digits.
            let frac: String = format!("{:0<3}", frac).chars().take(3).collect();
            frac.parse().ok()?
        }
        _ => 0,
    };

    Some(((hours * 3600 + minutes * 60 + seconds) * 1000) + millis)
}
