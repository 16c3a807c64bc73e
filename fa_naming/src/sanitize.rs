//! ABOUTME: Filename sanitization and canonical movie stem construction
//! ABOUTME: Produces stems like "Title (Year) {tmdb-ID}" safe for any filesystem

use regex::Regex;
use std::sync::OnceLock;

fn forbidden_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid filename pattern"))
}

/// Longest name produced, in chars. Keeps room for suffixes and extensions
/// under common 255-byte filename limits.
const MAX_NAME_CHARS: usize = 180;

/// Make a string safe to use as a filename. Runs of forbidden characters
/// collapse to a single underscore, whitespace runs collapse to single
/// spaces, the result is capped at 180 chars, and trailing dots and spaces
/// are removed.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = forbidden_chars().replace_all(name, "_");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    capped.trim_end_matches(['.', ' ']).to_string()
}

/// Build the canonical movie stem `Title (Year) {tmdb-ID}`.
///
/// Year and TMDb segments are omitted when unknown. The result is sanitized;
/// if everything sanitizes away, "Movie" is used.
pub fn movie_stem(title: &str, year: Option<i32>, tmdb_id: Option<u64>) -> String {
    let title = title.trim();
    let mut stem = if title.is_empty() {
        "Movie".to_string()
    } else {
        title.to_string()
    };
    if let Some(year) = year {
        stem.push_str(&format!(" ({year})"));
    }
    if let Some(tmdb_id) = tmdb_id {
        stem.push_str(&format!(" {{tmdb-{tmdb_id}}}"));
    }

    let cleaned = sanitize_filename(&stem);
    if cleaned.is_empty() {
        "Movie".to_string()
    } else {
        cleaned
    }
}
