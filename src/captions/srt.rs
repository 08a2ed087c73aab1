//! SubRip (SRT) block parser.

use super::{clean_cue_text, parse_timestamp, TranscriptSegment};

pub fn parse(content: &str) -> Vec<TranscriptSegment> {
    let normalized = content.replace("\r\n", "\n");

    normalized
        .split("\n\n")
        .filter_map(parse_block)
        .collect()
}

/// One blank-line-separated block: optional index line, a timing line
/// containing `-->`, then the cue text.
fn parse_block(block: &str) -> Option<TranscriptSegment> {
    let lines: Vec<&str> = block.lines().collect();
    let timing_index = lines.iter().position(|line| line.contains("-->"))?;

    let (start_raw, end_raw) = lines[timing_index].split_once("-->")?;
    let start_ms = parse_timestamp(start_raw)?;
    let end_ms = parse_timestamp(end_raw)?;

    let text = lines[timing_index + 1..]
        .iter()
        .map(|line| clean_cue_text(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        return None;
    }

    Some(TranscriptSegment::new(start_ms, Some(end_ms), text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_two_block_file() {
        let srt = "1\n00:00:01,000 --> 00:00:02,500\nFirst line\n\n2\n00:00:02,500 --> 00:00:04,000\nSecond line\npart two\n";
        let segments = parse(srt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_ms, 1000);
        assert_eq!(segments[0].end_ms, Some(2500));
        assert_eq!(segments[0].text, "First line");
        assert_eq!(segments[1].text, "Second line part two");
    }

    #[test]
    fn test_single_digit_hour_and_dot_millis() {
        let srt = "1\n1:02:03.400 --> 1:02:04.000\ncue\n";
        let segments = parse(srt);
        assert_eq!(segments[0].start_ms, 3_723_400);
    }

    #[test]
    fn test_crlf_line_endings() {
        let srt = "1\r\n00:00:00,000 --> 00:00:01,000\r\nwindows line\r\n\r\n2\r\n00:00:01,000 --> 00:00:02,000\r\nsecond\r\n";
        let segments = parse(srt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "windows line");
    }

    #[test]
    fn test_tags_stripped_and_entities_decoded() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\n<i>don&#39;t</i> stop\n";
        let segments = parse(srt);
        assert_eq!(segments[0].text, "don't stop");
    }

    #[test]
    fn test_block_without_timing_skipped() {
        let srt = "just a stray paragraph\n\n1\n00:00:00,000 --> 00:00:01,000\nreal cue\n";
        let segments = parse(srt);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "real cue");
    }
}
