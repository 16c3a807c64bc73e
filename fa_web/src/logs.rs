//! ABOUTME: Log display filtering for job polling responses
//! ABOUTME: Hides debug chatter and noisy warnings unless debug mode is on

/// Warning lines containing these snippets are platform noise, not useful
/// to someone watching a download.
const NOISY_WARNING_SNIPPETS: &[&str] = &[
    "[youtube]",
    "sabr streaming",
    "web client https formats have been skipped",
    "web_safari client https formats have been skipped",
    "tv client https formats have been skipped",
];

/// Lines matching these phrases are always shown, they mark pipeline
/// milestones users care about.
const ESSENTIAL_PHRASES: &[&str] = &[
    "success! video saved",
    "renaming downloaded file",
    "treating video as main video file",
    "storing video in subfolder",
    "created movie folder",
    "fetching radarr details",
    "resolved youtube format",
    "merging playlist videos",
];

/// Reduce a job's raw log buffer to the lines worth displaying. In debug
/// mode every non-empty line survives; otherwise debug lines and known-noisy
/// warnings are dropped, and plain lines must match a milestone phrase.
pub fn filter_logs_for_display(logs: &[String], debug_mode: bool) -> Vec<String> {
    let mut filtered = Vec::new();
    for raw in logs {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if debug_mode {
            filtered.push(trimmed.to_string());
            continue;
        }

        let lowered = trimmed.to_lowercase();
        if lowered.starts_with("debug:") {
            continue;
        }
        if lowered.starts_with("warning:")
            && NOISY_WARNING_SNIPPETS.iter().any(|s| lowered.contains(s))
        {
            continue;
        }
        if ["error:", "warning:", "[download]", "[ffmpeg]", "[merger]"]
            .iter()
            .any(|p| lowered.starts_with(p))
        {
            filtered.push(trimmed.to_string());
            continue;
        }
        if ESSENTIAL_PHRASES.iter().any(|p| lowered.contains(p)) {
            filtered.push(trimmed.to_string());
        }
    }
    filtered
}
