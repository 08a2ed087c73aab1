use serde::{Deserialize, Serialize};

/// Failure categories shared by every caption backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    VideoPrivate,
    VideoUnavailable,
    VideoLive,
    AgeRestricted,
    NoCaptions,
    RateLimited,
    ProviderTokenError,
    Timeout,
    NetworkError,
    ParseError,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::VideoPrivate => "video_private",
            ErrorKind::VideoUnavailable => "video_unavailable",
            ErrorKind::VideoLive => "video_live",
            ErrorKind::AgeRestricted => "age_restricted",
            ErrorKind::NoCaptions => "no_captions",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ProviderTokenError => "provider_token_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether this failure is a property of the video itself.
    ///
    /// Permanent failures stop the fallback loop: no other backend can make a
    /// private, deleted, or still-live video yield captions. Age restriction
    /// and parse errors are excluded: another backend may not need
    /// credentials, and parse drift is an upstream format change rather than
    /// a fact about the video.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ErrorKind::VideoPrivate | ErrorKind::VideoUnavailable | ErrorKind::VideoLive
        )
    }

    /// Default retry verdict for an already-typed failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::Timeout
                | ErrorKind::NetworkError
                | ErrorKind::ProviderTokenError
        )
    }

    /// Position in the "best error to surface" ordering (lower is more
    /// specific/actionable). Used when every strategy has failed and exactly
    /// one failure must be reported.
    pub fn surface_priority(&self) -> usize {
        match self {
            ErrorKind::NoCaptions => 0,
            ErrorKind::VideoPrivate => 1,
            ErrorKind::VideoUnavailable => 2,
            ErrorKind::VideoLive => 3,
            ErrorKind::AgeRestricted => 4,
            ErrorKind::RateLimited => 5,
            ErrorKind::ProviderTokenError => 6,
            ErrorKind::Timeout => 7,
            ErrorKind::NetworkError => 8,
            ErrorKind::ParseError => 9,
            ErrorKind::Unknown => 10,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure produced by a caption backend.
///
/// Backends translate transport-specific failures into this shape before
/// returning, so the orchestration loop never sees a raw transport error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExtractionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExtractionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a raw message and wrap it in one step.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let classification = classify(&message);
        Self {
            kind: classification.kind,
            message,
        }
    }

    /// Fold an unexpected fault (anything a backend did not translate itself)
    /// into an `Unknown` failure.
    pub fn unexpected(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Unknown, err.to_string())
    }

    /// Retry verdict: the typed kind acts as the explicit flag; `Unknown`
    /// falls back to message classification.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Unknown => classify(&self.message).retryable,
            kind => kind.is_retryable(),
        }
    }
}

/// Verdict produced by [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl Classification {
    fn new(kind: ErrorKind, retryable: bool) -> Self {
        Self { kind, retryable }
    }
}

/// Classify a raw failure message into an [`ErrorKind`] and a retry verdict.
///
/// Pure substring matching over the lowercased message, evaluated in a fixed
/// precedence order so specific conditions win over generic ones. Unrecognized
/// messages classify as `Unknown` and are not retried; an unrecognized failure
/// is more likely a bug than a transient condition.
pub fn classify(message: &str) -> Classification {
    classify_with_hint(message, None)
}

/// Like [`classify`], honoring an explicit retryable hint carried by the
/// error when no message rule matched first.
pub fn classify_with_hint(message: &str, retryable_hint: Option<bool>) -> Classification {
    let msg = message.to_lowercase();

    // Live streams and premieres cannot have a finished transcript yet.
    if contains_any(&msg, &["is live", "live stream", "livestream", "upcoming", "premiere"]) {
        return Classification::new(ErrorKind::VideoLive, false);
    }

    if contains_any(&msg, &["rate limit", "too many requests", "quota", "429"]) {
        return Classification::new(ErrorKind::RateLimited, true);
    }

    if contains_any(&msg, &["timeout", "timed out", "deadline exceeded"]) {
        return Classification::new(ErrorKind::Timeout, true);
    }

    if contains_any(
        &msg,
        &[
            "no caption",
            "no transcript",
            "transcript is disabled",
            "transcripts disabled",
            "captions disabled",
            "subtitles are disabled",
        ],
    ) {
        return Classification::new(ErrorKind::NoCaptions, false);
    }

    if msg.contains("private") {
        return Classification::new(ErrorKind::VideoPrivate, false);
    }
    // "video unavailable", never the bare word: "503 Service Unavailable"
    // must fall through to the server-error rule below.
    if contains_any(
        &msg,
        &[
            "video unavailable",
            "video is unavailable",
            "no longer available",
            "deleted",
            "removed",
            "does not exist",
            "404",
        ],
    ) {
        return Classification::new(ErrorKind::VideoUnavailable, false);
    }
    if contains_any(&msg, &["age restricted", "age-restricted", "sign in to confirm", "sign-in"]) {
        return Classification::new(ErrorKind::AgeRestricted, false);
    }

    if contains_any(
        &msg,
        &[
            "connection refused",
            "connection reset",
            "host not found",
            "dns",
            "socket",
            "fetch failed",
            "network",
            "econnrefused",
        ],
    ) {
        return Classification::new(ErrorKind::NetworkError, true);
    }

    if contains_any(
        &msg,
        &[
            "500",
            "502",
            "503",
            "504",
            "internal server error",
            "bad gateway",
            "service unavailable",
        ],
    ) {
        return Classification::new(ErrorKind::NetworkError, true);
    }

    if let Some(retryable) = retryable_hint {
        return Classification::new(ErrorKind::Unknown, retryable);
    }

    // Fail closed: retrying an unrecognized failure usually just repeats a bug.
    Classification::new(ErrorKind::Unknown, false)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_wording_wins_over_network() {
        let c = classify("network error: video is live and cannot be fetched");
        assert_eq!(c.kind, ErrorKind::VideoLive);
        assert!(!c.retryable);
    }

    #[test]
    fn test_rate_limit_variants() {
        for msg in ["HTTP 429 Too Many Requests", "quota exceeded", "Rate limit hit"] {
            let c = classify(msg);
            assert_eq!(c.kind, ErrorKind::RateLimited, "{}", msg);
            assert!(c.retryable);
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let c = classify("request timed out after 10s");
        assert_eq!(c.kind, ErrorKind::Timeout);
        assert!(c.retryable);
    }

    #[test]
    fn test_permanent_video_conditions() {
        assert_eq!(classify("this video is private").kind, ErrorKind::VideoPrivate);
        assert_eq!(classify("Video unavailable").kind, ErrorKind::VideoUnavailable);
        assert_eq!(classify("video has been removed").kind, ErrorKind::VideoUnavailable);
        assert!(!classify("this video is private").retryable);
    }

    #[test]
    fn test_age_restriction_not_retryable_but_not_permanent() {
        let c = classify("Sign in to confirm your age");
        assert_eq!(c.kind, ErrorKind::AgeRestricted);
        assert!(!c.retryable);
        assert!(!c.kind.is_permanent());
    }

    #[test]
    fn test_no_captions_wording() {
        let c = classify("Transcript is disabled on this video");
        assert_eq!(c.kind, ErrorKind::NoCaptions);
        assert!(!c.retryable);
    }

    #[test]
    fn test_network_and_server_errors_retryable() {
        for msg in [
            "connection refused",
            "fetch failed",
            "HTTP 503 Service Unavailable",
            "bad gateway",
        ] {
            let c = classify(msg);
            assert_eq!(c.kind, ErrorKind::NetworkError, "{}", msg);
            assert!(c.retryable, "{}", msg);
        }
    }

    #[test]
    fn test_unknown_fails_closed() {
        let c = classify("something inexplicable happened");
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert!(!c.retryable);
    }

    #[test]
    fn test_explicit_retryable_hint_applies_only_as_fallback() {
        let hinted = classify_with_hint("something inexplicable happened", Some(true));
        assert_eq!(hinted.kind, ErrorKind::Unknown);
        assert!(hinted.retryable);

        // A matched rule wins over the hint.
        let matched = classify_with_hint("this video is private", Some(true));
        assert!(!matched.retryable);
    }

    #[test]
    fn test_permanence_set() {
        assert!(ErrorKind::VideoPrivate.is_permanent());
        assert!(ErrorKind::VideoUnavailable.is_permanent());
        assert!(ErrorKind::VideoLive.is_permanent());
        assert!(!ErrorKind::AgeRestricted.is_permanent());
        assert!(!ErrorKind::ParseError.is_permanent());
        assert!(!ErrorKind::NoCaptions.is_permanent());
    }

    #[test]
    fn test_surface_priority_ordering() {
        assert!(ErrorKind::NoCaptions.surface_priority() < ErrorKind::Timeout.surface_priority());
        assert!(ErrorKind::Timeout.surface_priority() < ErrorKind::Unknown.surface_priority());
    }
}
