//! ABOUTME: Media catalog integration and video search
//! ABOUTME: Radarr API client plus yt-dlp backed search adapters

use async_trait::async_trait;
use fa_core::Result;
use serde::{Deserialize, Serialize};

pub mod radarr;
pub mod search;

pub use radarr::RadarrClient;
pub use search::{SearchResult, VideoSearch, YtDlpSearch};

/// A movie known to the media catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tmdb_id: Option<u64>,
    /// On-disk movie folder, when the catalog has one assigned
    #[serde(default)]
    pub path: Option<String>,
}

/// Lookup data for a movie not yet in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieLookup {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tmdb_id: Option<u64>,
    #[serde(default)]
    pub title_slug: Option<String>,
    #[serde(default)]
    pub images: Vec<serde_json::Value>,
    #[serde(default)]
    pub minimum_availability: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub remote_poster: Option<String>,
}

/// A root folder configured in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootFolder {
    pub id: u64,
    pub path: String,
    #[serde(default)]
    pub accessible: bool,
}

/// A quality profile configured in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub id: u64,
    pub name: String,
}

/// Options for creating a new catalog entry
#[derive(Debug, Clone)]
pub struct NewMovieOptions {
    pub tmdb_id: u64,
    pub quality_profile_id: u64,
    pub root_folder_path: String,
    pub monitored: bool,
    /// Ask the catalog to start searching for a release immediately
    pub search: bool,
}

/// Criteria for resolving a catalog movie from partial request metadata
#[derive(Debug, Clone, Default)]
pub struct MovieSelector {
    pub id: Option<u64>,
    pub tmdb_id: Option<u64>,
    pub title: Option<String>,
    pub year: Option<i32>,
}

/// Interface to the movie catalog
#[async_trait]
pub trait MediaManager: Send + Sync {
    /// Fetch a single movie by its catalog id
    async fn get_movie(&self, id: u64) -> Result<MovieRecord>;

    /// Fetch every movie, sorted by title
    async fn list_movies(&self) -> Result<Vec<MovieRecord>>;

    /// Look up a movie by TMDb id for preview or creation
    async fn lookup_tmdb(&self, tmdb_id: u64) -> Result<Option<MovieLookup>>;

    /// Free-text lookup for movies not necessarily in the catalog yet
    async fn search_movies(&self, term: &str) -> Result<Vec<MovieLookup>>;

    /// Create a catalog entry and return the stored record
    async fn add_movie(&self, options: &NewMovieOptions) -> Result<MovieRecord>;

    /// List configured root folders
    async fn root_folders(&self) -> Result<Vec<RootFolder>>;

    /// List configured quality profiles
    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>>;
}

/// Resolve a movie from assorted request metadata: by catalog id first, then
/// TMDb id, then exact title (optionally narrowed by year).
pub async fn resolve_movie(
    manager: &dyn MediaManager,
    selector: &MovieSelector,
) -> Result<Option<MovieRecord>> {
    if let Some(id) = selector.id {
        return Ok(Some(manager.get_movie(id).await?));
    }

    let movies = manager.list_movies().await?;
    if let Some(tmdb_id) = selector.tmdb_id {
        if let Some(movie) = movies.iter().find(|m| m.tmdb_id == Some(tmdb_id)) {
            return Ok(Some(movie.clone()));
        }
    }
    if let Some(title) = selector.title.as_deref() {
        let lowered = title.to_lowercase();
        let mut matches: Vec<&MovieRecord> = movies
            .iter()
            .filter(|m| m.title.to_lowercase() == lowered)
            .collect();
        if let Some(year) = selector.year {
            matches.retain(|m| m.year == Some(year));
        }
        if let Some(movie) = matches.first() {
            return Ok(Some((*movie).clone()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fa_core::Error;

    struct FakeManager {
        movies: Vec<MovieRecord>,
    }

    #[async_trait]
    impl MediaManager for FakeManager {
        async fn get_movie(&self, id: u64) -> Result<MovieRecord> {
            self.movies
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("movie {id}")))
        }

        async fn list_movies(&self) -> Result<Vec<MovieRecord>> {
            Ok(self.movies.clone())
        }

        async fn lookup_tmdb(&self, _tmdb_id: u64) -> Result<Option<MovieLookup>> {
            Ok(None)
        }

        async fn search_movies(&self, _term: &str) -> Result<Vec<MovieLookup>> {
            Ok(Vec::new())
        }

        async fn add_movie(&self, _options: &NewMovieOptions) -> Result<MovieRecord> {
            Err(Error::Upstream("not supported".to_string()))
        }

        async fn root_folders(&self) -> Result<Vec<RootFolder>> {
            Ok(Vec::new())
        }

        async fn quality_profiles(&self) -> Result<Vec<QualityProfile>> {
            Ok(Vec::new())
        }
    }

    fn movie(id: u64, title: &str, year: i32, tmdb_id: u64) -> MovieRecord {
        MovieRecord {
            id,
            title: title.to_string(),
            year: Some(year),
            tmdb_id: Some(tmdb_id),
            path: None,
        }
    }

    fn manager() -> FakeManager {
        FakeManager {
            movies: vec![
                movie(1, "Solaris", 1972, 593),
                movie(2, "Solaris", 2002, 2048),
                movie(3, "Stalker", 1979, 1398),
            ],
        }
    }

    #[tokio::test]
    async fn test_resolve_by_id_wins() {
        let selector = MovieSelector {
            id: Some(3),
            tmdb_id: Some(593),
            ..Default::default()
        };
        let found = resolve_movie(&manager(), &selector).await.unwrap().unwrap();
        assert_eq!(found.title, "Stalker");
    }

    #[tokio::test]
    async fn test_resolve_by_tmdb() {
        let selector = MovieSelector {
            tmdb_id: Some(2048),
            ..Default::default()
        };
        let found = resolve_movie(&manager(), &selector).await.unwrap().unwrap();
        assert_eq!(found.id, 2);
    }

    #[tokio::test]
    async fn test_resolve_by_title_narrowed_by_year() {
        let selector = MovieSelector {
            title: Some("solaris".to_string()),
            year: Some(2002),
            ..Default::default()
        };
        let found = resolve_movie(&manager(), &selector).await.unwrap().unwrap();
        assert_eq!(found.id, 2);
    }

    #[tokio::test]
    async fn test_resolve_unknown_is_none() {
        let selector = MovieSelector {
            title: Some("Mirror".to_string()),
            ..Default::default()
        };
        assert!(resolve_movie(&manager(), &selector).await.unwrap().is_none());
    }
}
