use url::Url;

/// Canonical video id length (alphanumeric plus `_` and `-`)
const VIDEO_ID_LEN: usize = 11;

/// Check whether a string is already a valid bare video id.
pub fn is_valid_video_id(input: &str) -> bool {
    input.len() == VIDEO_ID_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Resolve a bare id or a platform URL to a canonical video id.
///
/// Supported URL forms: `watch?v=<id>`, `youtu.be/<id>`, `/shorts/<id>`,
/// `/embed/<id>`, `/v/<id>`, and `/live/<id>`. Returns `None` when the input
/// cannot be resolved, in which case no backend should be invoked.
pub fn resolve_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_valid_video_id(input) {
        return Some(input.to_string());
    }

    let parsed = Url::parse(input).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.trim_start_matches("www.");

    // Short links carry the id as the whole path.
    if host == "youtu.be" {
        let id = parsed.path_segments()?.next()?;
        return is_valid_video_id(id).then(|| id.to_string());
    }

    if !matches!(host, "youtube.com" | "m.youtube.com" | "music.youtube.com") {
        return None;
    }

    // Canonical watch links: /watch?v=<id>
    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        if is_valid_video_id(&id) {
            return Some(id.to_string());
        }
    }

    // Path forms: /shorts/<id>, /embed/<id>, /v/<id>, /live/<id>
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    if let ["shorts" | "embed" | "v" | "live", id, ..] = segments.as_slice() {
        if is_valid_video_id(id) {
            return Some((*id).to_string());
        }
    }

    None
}

/// Runtime memory headroom in megabytes, when the platform exposes it.
///
/// Used as an availability gate for memory-heavy backends. `None` means the
/// figure is unknown and the gate should pass.
pub fn available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemAvailable:") {
                let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
                return Some(kb / 1024);
            }
        }
        None
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Check if the current environment has the optional external tools.
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp").await {
        missing.push("yt-dlp - required for the external downloader backend".to_string());
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
