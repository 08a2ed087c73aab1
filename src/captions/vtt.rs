//! Line-scanning WebVTT parser.
//!
//! Auto-generated VTT tracks interleave header metadata, cue identifiers, and
//! rolling cue payloads; a line scanner copes with the malformed output some
//! backends produce better than a strict block parser would.

use super::{clean_cue_text, parse_timestamp, TranscriptSegment};

pub fn parse(content: &str) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut current: Option<(u64, u64)> = None;
    let mut text_lines: Vec<String> = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();

        if line.is_empty() || is_header_line(line) {
            flush(&mut segments, &mut current, &mut text_lines);
            continue;
        }

        if let Some((start_ms, end_ms)) = parse_cue_timing(line) {
            flush(&mut segments, &mut current, &mut text_lines);
            current = Some((start_ms, end_ms));
            continue;
        }

        // Pure-numeric identifier lines also appear mid-stream in malformed
        // rolling tracks; short alphanumeric identifiers are only expected
        // between cues, where skipping them cannot eat one-word cue text.
        if is_numeric_identifier(line) {
            continue;
        }
        if current.is_none() {
            // Anything else before a timing line is an identifier or a stray
            // settings line; there is no cue to accumulate into.
            continue;
        }

        let cleaned = clean_cue_text(line);
        if !cleaned.is_empty() {
            text_lines.push(cleaned);
        }
    }

    flush(&mut segments, &mut current, &mut text_lines);
    segments
}

fn flush(
    segments: &mut Vec<TranscriptSegment>,
    current: &mut Option<(u64, u64)>,
    text_lines: &mut Vec<String>,
) {
    if let Some((start_ms, end_ms)) = current.take() {
        let text = text_lines.join(" ");
        if !text.trim().is_empty() {
            segments.push(TranscriptSegment::new(start_ms, Some(end_ms), text));
        }
    }
    text_lines.clear();
}

fn is_header_line(line: &str) -> bool {
    line.starts_with("WEBVTT")
        || line.starts_with("NOTE")
        || line.starts_with("STYLE")
        || line.starts_with("REGION")
        || line.starts_with("Kind:")
        || line.starts_with("Language:")
}

fn is_numeric_identifier(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

/// Parse `HH:MM:SS.mmm --> HH:MM:SS.mmm` (trailing cue settings allowed).
fn parse_cue_timing(line: &str) -> Option<(u64, u64)> {
    let (start_raw, rest) = line.split_once("-->")?;
    let end_raw = rest.trim().split_whitespace().next()?;
    let start_ms = parse_timestamp(start_raw)?;
    let end_ms = parse_timestamp(end_raw)?;
    Some((start_ms, end_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cue_with_markup() {
        let segments = parse("00:00:01.000 --> 00:00:02.000\nHi <b>there</b>");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_ms, 1000);
        assert_eq!(segments[0].end_ms, Some(2000));
        assert_eq!(segments[0].text, "Hi there");
    }

    #[test]
    fn test_full_document_with_headers_and_identifiers() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n1\n00:00:00.000 --> 00:00:01.500\nfirst cue\n\ncue-2\n00:00:01.500 --> 00:00:03.000 align:start position:0%\nsecond\ncue\n";
        let segments = parse(vtt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first cue");
        assert_eq!(segments[1].text, "second cue");
        assert_eq!(segments[1].start_ms, 1500);
        assert_eq!(segments[1].end_ms, Some(3000));
    }

    #[test]
    fn test_comma_decimal_separator_accepted() {
        let segments = parse("00:00:01,000 --> 00:00:02,500\ntext");
        assert_eq!(segments[0].start_ms, 1000);
        assert_eq!(segments[0].end_ms, Some(2500));
    }

    #[test]
    fn test_voice_and_class_tags_stripped() {
        let segments =
            parse("00:00:00.000 --> 00:00:01.000\n<v Narrator><c.yellow>hello</c> world</v>");
        assert_eq!(segments[0].text, "hello world");
    }

    #[test]
    fn test_note_block_flushes_pending_cue() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nbefore note\nNOTE this is a comment\n00:00:01.000 --> 00:00:02.000\nafter note\n";
        let segments = parse(vtt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "before note");
        assert_eq!(segments[1].text, "after note");
    }

    #[test]
    fn test_cue_with_empty_payload_dropped() {
        let segments = parse("00:00:00.000 --> 00:00:01.000\n\n00:00:01.000 --> 00:00:02.000\nkept");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
    }
}
