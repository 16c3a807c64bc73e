//! ABOUTME: Request and response models for the REST API
//! ABOUTME: RFC 7807 problem details plus job and search view types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fa_jobs::{ExtraSpec, Job, JobRequest, JobTarget, PlaylistMode, StandaloneNameMode};
use fa_media::{MovieLookup, MovieRecord, QualityProfile, RootFolder, SearchResult};
use fa_naming::ExtraType;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;
use crate::logs::filter_logs_for_display;
use crate::urls::normalize_video_url;

/// RFC 7807 Problem Details payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl ProblemDetails {
    pub fn new(problem_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            problem_type: problem_type.into(),
            title: title.into(),
            status: None,
            detail: None,
            extensions: HashMap::new(),
        }
    }

    pub fn validation_error(detail: impl Into<String>) -> Self {
        Self::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.5.1",
            "Bad Request",
        )
        .with_status(400)
        .with_detail(detail)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

/// Body for `POST /api/jobs`
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateJobRequest {
    /// Remote video or playlist URL
    #[validate(length(min = 1, message = "Video URL is required."))]
    pub url: String,
    /// Radarr movie id, when the movie is already in the library
    pub movie_id: Option<u64>,
    pub tmdb_id: Option<u64>,
    pub title: Option<String>,
    pub year: Option<i32>,
    /// Place the download in its own folder outside the movie library
    pub standalone: bool,
    /// "youtube" (default) or "custom"
    pub standalone_name_mode: Option<String>,
    pub custom_name: Option<String>,
    /// Store the video as extra content in a movie subfolder
    pub extra: bool,
    pub extra_type: Option<String>,
    pub extra_name: Option<String>,
    /// "single" (default) or "merge"
    pub playlist_mode: Option<String>,
}

impl CreateJobRequest {
    /// Turn the validated body into the pipeline's request shape. Every
    /// rejection carries the message shown to the user.
    pub fn into_request(self) -> Result<JobRequest, ApiError> {
        let url = normalize_video_url(&self.url).map_err(ApiError::bad_request)?;
        let playlist_mode = parse_playlist_mode(self.playlist_mode.as_deref())?;

        let target = if self.standalone {
            let custom_name = self
                .custom_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string);
            let name_mode = match self
                .standalone_name_mode
                .as_deref()
                .map(str::trim)
                .map(str::to_lowercase)
                .as_deref()
            {
                Some("custom") if custom_name.is_some() => StandaloneNameMode::Custom,
                _ => StandaloneNameMode::Youtube,
            };
            JobTarget::Standalone {
                name_mode,
                custom_name,
            }
        } else {
            if self.movie_id.is_none() && self.tmdb_id.is_none() && self.title.is_none() {
                return Err(ApiError::bad_request(
                    "No movie selected. Please choose a movie from the suggestions list.",
                ));
            }
            let extra = if self.extra {
                let name = self
                    .extra_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                if name.is_none() {
                    return Err(ApiError::bad_request(
                        "Extra name is required when storing in a subfolder.",
                    ));
                }
                let extra_type = match self.extra_type.as_deref() {
                    None => ExtraType::Trailer,
                    Some(raw) => ExtraType::parse(raw).unwrap_or(ExtraType::Other),
                };
                Some(ExtraSpec { extra_type, name })
            } else {
                None
            };
            JobTarget::Movie {
                id: self.movie_id,
                tmdb_id: self.tmdb_id,
                title: self
                    .title
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
                year: self.year,
                extra,
            }
        };

        Ok(JobRequest {
            url,
            target,
            playlist_mode,
        })
    }
}

fn parse_playlist_mode(raw: Option<&str>) -> Result<PlaylistMode, ApiError> {
    match raw.map(str::trim).map(str::to_lowercase).as_deref() {
        None | Some("") | Some("single") => Ok(PlaylistMode::Single),
        Some("merge") => Ok(PlaylistMode::Merge),
        Some(_) => Err(ApiError::bad_request(
            "Invalid playlist handling option selected.",
        )),
    }
}

/// Job snapshot returned by the API, with display-filtered logs
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub status: String,
    pub progress: f32,
    pub label: String,
    pub subtitle: String,
    pub metadata: Vec<String>,
    pub message: String,
    pub logs: Vec<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobView {
    pub fn from_job(job: &Job, debug_mode: bool) -> Self {
        Self {
            id: job.id.to_string(),
            status: job.status.to_string(),
            progress: job.progress,
            label: job.label.clone(),
            subtitle: job.subtitle.clone(),
            metadata: job.metadata.clone(),
            message: job.message.clone(),
            logs: filter_logs_for_display(&job.logs, debug_mode),
            url: job.request.url.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// Envelope for a single job
#[derive(Debug, Serialize, ToSchema)]
pub struct JobEnvelope {
    pub job: JobView,
    pub debug_mode: bool,
}

/// Envelope for the job list
#[derive(Debug, Serialize, ToSchema)]
pub struct JobListEnvelope {
    pub jobs: Vec<JobView>,
    pub debug_mode: bool,
}

/// Response for a cancellation request
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelEnvelope {
    pub job: JobView,
    pub message: String,
}

/// One video platform search hit
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl From<SearchResult> for VideoSearchItem {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.id,
            title: result.title,
            url: result.url,
            uploader: result.uploader,
            view_count: result.view_count,
            duration: result.duration,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoSearchResponse {
    pub results: Vec<VideoSearchItem>,
}

/// Movie lookup preview for search and TMDb lookups
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovieLookupView {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u64>,
    pub overview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub remote_poster: String,
    #[schema(value_type = Vec<Object>)]
    pub images: Vec<serde_json::Value>,
    pub title_slug: String,
    pub minimum_availability: String,
}

impl From<MovieLookup> for MovieLookupView {
    fn from(lookup: MovieLookup) -> Self {
        Self {
            title: lookup.title,
            year: lookup.year,
            tmdb_id: lookup.tmdb_id,
            overview: lookup.overview.unwrap_or_default(),
            runtime: lookup.runtime,
            genres: lookup.genres,
            remote_poster: lookup.remote_poster.unwrap_or_default(),
            images: lookup.images,
            title_slug: lookup.title_slug.unwrap_or_default(),
            minimum_availability: lookup
                .minimum_availability
                .unwrap_or_else(|| "released".to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovieSearchResponse {
    pub results: Vec<MovieLookupView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovieLookupResponse {
    pub movie: MovieLookupView,
}

/// Short movie record returned after creation
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecordView {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u64>,
}

impl From<MovieRecord> for MovieRecordView {
    fn from(movie: MovieRecord) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            year: movie.year,
            tmdb_id: movie.tmdb_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovieCreatedResponse {
    pub movie: MovieRecordView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RootFolderView {
    pub id: u64,
    pub path: String,
    pub accessible: bool,
}

impl From<RootFolder> for RootFolderView {
    fn from(folder: RootFolder) -> Self {
        Self {
            id: folder.id,
            path: folder.path,
            accessible: folder.accessible,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfileView {
    pub id: u64,
    pub name: String,
}

impl From<QualityProfile> for QualityProfileView {
    fn from(profile: QualityProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
        }
    }
}

/// Library options used by the movie creation form
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovieOptionsResponse {
    pub root_folders: Vec<RootFolderView>,
    pub quality_profiles: Vec<QualityProfileView>,
}

/// Body for `POST /api/movies`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMovieRequest {
    pub tmdb_id: u64,
    #[serde(default)]
    pub quality_profile_id: Option<u64>,
    #[serde(default)]
    pub root_folder_path: Option<String>,
    #[serde(default)]
    pub monitored: Option<bool>,
    #[serde(default)]
    pub search: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CreateJobRequest {
        CreateJobRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            movie_id: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_request_movie_target() {
        let request = base_request().into_request().unwrap();
        assert_eq!(request.playlist_mode, PlaylistMode::Single);
        match request.target {
            JobTarget::Movie { id, extra, .. } => {
                assert_eq!(id, Some(7));
                assert!(extra.is_none());
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn test_into_request_rejects_blank_url() {
        let body = CreateJobRequest {
            url: "   ".to_string(),
            ..base_request()
        };
        let err = body.into_request().unwrap_err();
        assert_eq!(err.problem.detail.as_deref(), Some("Video URL is required."));
    }

    #[test]
    fn test_into_request_requires_movie_selection() {
        let body = CreateJobRequest {
            movie_id: None,
            ..base_request()
        };
        let err = body.into_request().unwrap_err();
        assert_eq!(err.status_code, 400);
        assert_eq!(
            err.problem.detail.as_deref(),
            Some("No movie selected. Please choose a movie from the suggestions list.")
        );
    }

    #[test]
    fn test_into_request_extra_requires_name() {
        let body = CreateJobRequest {
            extra: true,
            extra_type: Some("featurette".to_string()),
            ..base_request()
        };
        let err = body.into_request().unwrap_err();
        assert_eq!(
            err.problem.detail.as_deref(),
            Some("Extra name is required when storing in a subfolder.")
        );
    }

    #[test]
    fn test_into_request_unknown_extra_type_falls_back_to_other() {
        let body = CreateJobRequest {
            extra: true,
            extra_type: Some("bloopers".to_string()),
            extra_name: Some("Gag Reel".to_string()),
            ..base_request()
        };
        let request = body.into_request().unwrap();
        let extra = request.target.extra().unwrap();
        assert_eq!(extra.extra_type, ExtraType::Other);
        assert_eq!(extra.name.as_deref(), Some("Gag Reel"));
    }

    #[test]
    fn test_into_request_standalone_custom_without_name_falls_back() {
        let body = CreateJobRequest {
            movie_id: None,
            standalone: true,
            standalone_name_mode: Some("custom".to_string()),
            custom_name: Some("  ".to_string()),
            ..base_request()
        };
        let request = body.into_request().unwrap();
        match request.target {
            JobTarget::Standalone {
                name_mode,
                custom_name,
            } => {
                assert_eq!(name_mode, StandaloneNameMode::Youtube);
                assert!(custom_name.is_none());
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn test_invalid_playlist_mode_rejected() {
        let body = CreateJobRequest {
            playlist_mode: Some("shuffle".to_string()),
            ..base_request()
        };
        let err = body.into_request().unwrap_err();
        assert_eq!(
            err.problem.detail.as_deref(),
            Some("Invalid playlist handling option selected.")
        );
    }
}
