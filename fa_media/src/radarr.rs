//! ABOUTME: Radarr v3 API client
//! ABOUTME: Movie catalog queries, TMDb lookups, and movie creation

use async_trait::async_trait;
use fa_core::{Error, Result};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    MediaManager, MovieLookup, MovieRecord, NewMovieOptions, QualityProfile, RootFolder,
};

const API_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the Radarr v3 API
#[derive(Debug, Clone)]
pub struct RadarrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RadarrClient {
    /// Create a client for a Radarr instance. The base URL must not have a
    /// trailing slash.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| Error::Upstream(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(path, "Radarr GET");
        let response = self
            .client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Radarr request failed: {}", e)))?;
        Self::check_status(path, response.status())?;
        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Radarr returned invalid JSON: {}", e)))
    }

    fn check_status(path: &str, status: StatusCode) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        warn!(path, status = %status, "Radarr request rejected");
        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!(
                "Radarr has no resource at {path}"
            ))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Upstream(
                "Radarr rejected the API key.".to_string(),
            )),
            other => Err(Error::Upstream(format!(
                "Radarr responded with status {other}"
            ))),
        }
    }
}

#[async_trait]
impl MediaManager for RadarrClient {
    async fn get_movie(&self, id: u64) -> Result<MovieRecord> {
        self.get_json(&format!("/api/v3/movie/{id}"), &[]).await
    }

    async fn list_movies(&self) -> Result<Vec<MovieRecord>> {
        let mut movies: Vec<MovieRecord> = self.get_json("/api/v3/movie", &[]).await?;
        movies.sort_by_key(|movie| movie.title.to_lowercase());
        Ok(movies)
    }

    async fn lookup_tmdb(&self, tmdb_id: u64) -> Result<Option<MovieLookup>> {
        // Radarr answers with either a single object or a list here,
        // depending on version.
        let payload: serde_json::Value = self
            .get_json(
                "/api/v3/movie/lookup/tmdb",
                &[("tmdbId", tmdb_id.to_string())],
            )
            .await?;
        let entry = match payload {
            serde_json::Value::Array(mut entries) => {
                if entries.is_empty() {
                    return Ok(None);
                }
                entries.remove(0)
            }
            entry @ serde_json::Value::Object(_) => entry,
            _ => return Ok(None),
        };
        serde_json::from_value(entry)
            .map(Some)
            .map_err(|e| Error::Upstream(format!("Radarr returned invalid lookup data: {}", e)))
    }

    async fn search_movies(&self, term: &str) -> Result<Vec<MovieLookup>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<serde_json::Value> = self
            .get_json("/api/v3/movie/lookup", &[("term", term.to_string())])
            .await?;
        // Lookup results without a TMDb id cannot be added later, skip them.
        let mut results = Vec::new();
        for entry in entries {
            if entry.get("tmdbId").and_then(|v| v.as_u64()).is_none() {
                continue;
            }
            match serde_json::from_value::<MovieLookup>(entry) {
                Ok(lookup) => results.push(lookup),
                Err(e) => debug!(error = %e, "Skipping malformed lookup entry"),
            }
        }
        Ok(results)
    }

    async fn add_movie(&self, options: &NewMovieOptions) -> Result<MovieRecord> {
        let lookup = self.lookup_tmdb(options.tmdb_id).await?.ok_or_else(|| {
            Error::NotFound(format!("No TMDb match for id {}", options.tmdb_id))
        })?;

        let payload = json!({
            "title": lookup.title,
            "qualityProfileId": options.quality_profile_id,
            "titleSlug": lookup.title_slug.clone().unwrap_or_else(|| options.tmdb_id.to_string()),
            "tmdbId": lookup.tmdb_id.unwrap_or(options.tmdb_id),
            "year": lookup.year,
            "images": lookup.images,
            "rootFolderPath": options.root_folder_path,
            "monitored": options.monitored,
            "minimumAvailability": lookup.minimum_availability.as_deref().unwrap_or("released"),
            "addOptions": {"searchForMovie": options.search},
            "tags": [],
        });

        debug!(tmdb_id = options.tmdb_id, "Radarr POST /api/v3/movie");
        let response = self
            .client
            .post(self.url("/api/v3/movie"))
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to add movie to Radarr: {}", e)))?;
        Self::check_status("/api/v3/movie", response.status())?;
        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Radarr returned invalid JSON: {}", e)))
    }

    async fn root_folders(&self) -> Result<Vec<RootFolder>> {
        self.get_json("/api/v3/rootFolder", &[]).await
    }

    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>> {
        self.get_json("/api/v3/qualityProfile", &[]).await
    }
}
