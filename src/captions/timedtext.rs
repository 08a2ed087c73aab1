//! Parser for the simple timed-text XML caption format
//! (`<text start="1.0" dur="2.5">content</text>` elements).

use super::{clean_cue_text, TranscriptSegment};

pub fn parse(content: &str) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut rest = content;

    while let Some(open) = rest.find("<text") {
        rest = &rest[open..];
        let Some(tag_end) = rest.find('>') else {
            break;
        };
        let attrs = &rest[5..tag_end];

        // Self-closing elements carry no cue text.
        if attrs.trim_end().ends_with('/') {
            rest = &rest[tag_end + 1..];
            continue;
        }

        let body_and_rest = &rest[tag_end + 1..];
        let Some(close) = body_and_rest.find("</text>") else {
            break;
        };
        let body = &body_and_rest[..close];
        rest = &body_and_rest[close + "</text>".len()..];

        let Some(start_secs) = attr_value(attrs, "start").and_then(|v| v.parse::<f64>().ok())
        else {
            continue;
        };
        let start_ms = (start_secs * 1000.0).round().max(0.0) as u64;
        let end_ms = attr_value(attrs, "dur")
            .and_then(|v| v.parse::<f64>().ok())
            .map(|dur| start_ms + (dur * 1000.0).round().max(0.0) as u64);

        let text = clean_cue_text(body);
        if text.is_empty() {
            continue;
        }

        segments.push(TranscriptSegment::new(start_ms, end_ms, text));
    }

    segments
}

fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("{}=\"", name);
    let start = attrs.find(&marker)? + marker.len();
    let end = attrs[start..].find('"')?;
    Some(&attrs[start..start + end])
}
