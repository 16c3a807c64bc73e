//! ABOUTME: Video URL validation against the supported platform hosts
//! ABOUTME: Normalizes scheme-less input before parsing

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

const ALLOWED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
    "vimeo.com",
    "www.vimeo.com",
    "player.vimeo.com",
    "dailymotion.com",
    "www.dailymotion.com",
    "dai.ly",
    "www.dai.ly",
];

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*://").expect("valid scheme pattern"))
}

/// Validate a user-supplied video URL and return its normalized form.
/// Scheme-less input gets `https://` prepended before parsing.
pub fn normalize_video_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Video URL is required.".to_string());
    }

    let with_scheme = if scheme_pattern().is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|_| "Please provide a valid video URL.".to_string())?;

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    if !matches!(parsed.scheme(), "http" | "https") || !ALLOWED_HOSTS.contains(&host.as_str()) {
        return Err("Only YouTube, Vimeo, or Dailymotion URLs are supported.".to_string());
    }

    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_hosts() {
        for url in [
            "https://www.youtube.com/watch?v=abc",
            "https://youtu.be/abc",
            "http://vimeo.com/12345",
            "https://www.dai.ly/xyz",
        ] {
            assert!(normalize_video_url(url).is_ok(), "{url}");
        }
    }

    #[test]
    fn test_prepends_https_when_scheme_missing() {
        let normalized = normalize_video_url("youtube.com/watch?v=abc").unwrap();
        assert!(normalized.starts_with("https://youtube.com/"), "{normalized}");
    }

    #[test]
    fn test_rejects_empty_url() {
        assert_eq!(
            normalize_video_url("   ").unwrap_err(),
            "Video URL is required."
        );
    }

    #[test]
    fn test_rejects_unknown_host_and_scheme() {
        assert_eq!(
            normalize_video_url("https://example.com/video").unwrap_err(),
            "Only YouTube, Vimeo, or Dailymotion URLs are supported."
        );
        assert_eq!(
            normalize_video_url("ftp://youtube.com/watch").unwrap_err(),
            "Only YouTube, Vimeo, or Dailymotion URLs are supported."
        );
    }

    #[test]
    fn test_rejects_lookalike_host() {
        assert!(normalize_video_url("https://youtube.com.evil.tld/watch").is_err());
    }
}
