//! ABOUTME: Classification of subprocess output lines
//! ABOUTME: Maps raw yt-dlp/ffmpeg output to structured log lines with progress

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Prefixes that mark chatty downloader output only useful for debugging
const DEBUG_PREFIXES: &[&str] = &["[debug]", "[info]", "[extractor]", "[metadata]", "[youtube]"];

/// Classification of a single subprocess output line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Error,
    Warning,
    Progress,
    Debug,
    Plain,
}

/// A classified subprocess output line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub kind: LineKind,
    pub text: String,
}

impl LogLine {
    /// Render the line the way the job log stores it
    pub fn rendered(&self) -> String {
        match self.kind {
            LineKind::Error if !self.text.to_lowercase().starts_with("error") => {
                format!("ERROR: {}", self.text)
            }
            LineKind::Warning if !self.text.to_lowercase().starts_with("warning") => {
                format!("WARNING: {}", self.text)
            }
            LineKind::Debug => format!("DEBUG: {}", self.text),
            _ => self.text.clone(),
        }
    }
}

fn progress_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)%").expect("valid progress pattern"))
}

/// Extract an embedded percentage from an output line, if present
pub fn extract_progress(line: &str) -> Option<f32> {
    let captures = progress_pattern().captures(line)?;
    let value: f32 = captures.get(1)?.as_str().parse().ok()?;
    if (0.0..=100.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Classify a raw subprocess output line
pub fn classify(text: &str) -> LogLine {
    let line = text.trim();
    let lowered = line.to_lowercase();

    let kind = if line.starts_with("[download]") && extract_progress(line).is_some() {
        LineKind::Progress
    } else if lowered.contains("error") {
        LineKind::Error
    } else if lowered.contains("warning") {
        LineKind::Warning
    } else if DEBUG_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        LineKind::Debug
    } else {
        LineKind::Plain
    };

    LogLine {
        kind,
        text: line.to_string(),
    }
}
