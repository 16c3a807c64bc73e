//! ABOUTME: Video search against YouTube via the yt-dlp CLI
//! ABOUTME: Flat search extraction with a short-lived in-memory result cache

use async_trait::async_trait;
use fa_core::{Error, Result};
use fa_proc::CommandSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_RESULTS: usize = 20;
const CACHE_TTL: Duration = Duration::from_secs(90);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A single video search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: String,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    /// Duration in seconds
    pub duration: Option<f64>,
}

/// Interface for searching remote video platforms
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Raw flat-extraction entry emitted by yt-dlp, one JSON object per line
#[derive(Debug, Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    view_count: Option<u64>,
    concurrent_view_count: Option<u64>,
    duration: Option<f64>,
}

impl RawEntry {
    fn normalize(self) -> Option<SearchResult> {
        let url = match self.url {
            Some(url) => url,
            None => {
                let id = self.id.as_deref()?;
                format!("https://www.youtube.com/watch?v={id}")
            }
        };
        Some(SearchResult {
            id: self.id,
            title: self.title,
            url,
            uploader: self.uploader.or(self.channel),
            view_count: self.view_count.or(self.concurrent_view_count),
            duration: self.duration,
        })
    }
}

/// YouTube search backed by the yt-dlp CLI
pub struct YtDlpSearch {
    yt_dlp_bin: String,
    cache: Mutex<HashMap<(String, usize), (Instant, Vec<SearchResult>)>>,
}

impl YtDlpSearch {
    pub fn new(yt_dlp_bin: impl Into<String>) -> Self {
        Self {
            yt_dlp_bin: yt_dlp_bin.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &(String, usize)) -> Option<Vec<SearchResult>> {
        let cache = self.cache.lock().ok()?;
        let (stored_at, results) = cache.get(key)?;
        if stored_at.elapsed() < CACHE_TTL {
            Some(results.clone())
        } else {
            None
        }
    }

    fn store(&self, key: (String, usize), results: Vec<SearchResult>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|_, (stored_at, _)| stored_at.elapsed() < CACHE_TTL);
            cache.insert(key, (Instant::now(), results));
        }
    }

    fn parse_output(stdout: &str) -> Vec<SearchResult> {
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<RawEntry>(line) {
                Ok(entry) => entry.normalize(),
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable search entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl VideoSearch for YtDlpSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_RESULTS);
        let key = (query.to_lowercase(), limit);
        if let Some(results) = self.cached(&key) {
            debug!(query, limit, "Search cache hit");
            return Ok(results);
        }

        let spec = CommandSpec::new(&self.yt_dlp_bin).args([
            "--dump-json",
            "--flat-playlist",
            "--skip-download",
            "--no-warnings",
            &format!("ytsearch{limit}:{query}"),
        ]);
        let cancel = CancellationToken::new();
        let output = fa_proc::run_collected(spec, SEARCH_TIMEOUT, &cancel).await?;
        if output.timed_out {
            return Err(Error::Upstream("Video search timed out.".to_string()));
        }
        if !output.success() {
            let detail = output.stderr.lines().last().unwrap_or("unknown error");
            return Err(Error::Upstream(format!("Video search failed: {detail}")));
        }

        let mut results = Self::parse_output(&output.stdout);
        results.truncate(limit);
        self.store(key, results.clone());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_normalizes_entries() {
        let stdout = concat!(
            r#"{"id": "abc123", "title": "First", "uploader": "Chan", "view_count": 42, "duration": 61.0}"#,
            "\n",
            r#"{"id": "def456", "title": "Second", "url": "https://youtu.be/def456", "channel": "Other"}"#,
            "\n",
        );
        let results = YtDlpSearch::parse_output(stdout);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(results[0].uploader.as_deref(), Some("Chan"));
        assert_eq!(results[1].url, "https://youtu.be/def456");
        assert_eq!(results[1].uploader.as_deref(), Some("Other"));
    }

    #[test]
    fn test_parse_output_skips_garbage_and_urlless_entries() {
        let stdout = "not json\n{\"title\": \"no url or id\"}\n";
        assert!(YtDlpSearch::parse_output(stdout).is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_short_circuits() {
        let search = YtDlpSearch::new("yt-dlp-that-does-not-exist");
        let results = search.search("   ", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_cache_round_trip() {
        let search = YtDlpSearch::new("yt-dlp");
        let key = ("query".to_string(), 5);
        assert!(search.cached(&key).is_none());

        let results = vec![SearchResult {
            id: Some("x".to_string()),
            title: Some("X".to_string()),
            url: "https://example.com/x".to_string(),
            uploader: None,
            view_count: None,
            duration: None,
        }];
        search.store(key.clone(), results.clone());
        assert_eq!(search.cached(&key), Some(results));
    }
}
