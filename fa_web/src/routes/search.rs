//! ABOUTME: Search proxy endpoints for video platforms and the movie catalog
//! ABOUTME: Validates query length before delegating to the collaborators

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::models::{MovieSearchResponse, VideoSearchResponse};
use crate::AppState;

const DEFAULT_VIDEO_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct VideoSearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[get("/videos/search")]
pub async fn search_videos(
    state: web::Data<AppState>,
    query: web::Query<VideoSearchQuery>,
) -> ApiResult<HttpResponse> {
    let q = query.q.as_deref().unwrap_or("").trim();
    if q.chars().count() < 2 {
        return Err(ApiError::bad_request(
            "Please provide a search query with at least 2 characters.",
        ));
    }
    let limit = query.limit.unwrap_or(DEFAULT_VIDEO_RESULTS);

    let results = state.videos.search(q, limit).await.map_err(|e| {
        error!(query = q, error = %e, "Video search failed");
        ApiError::bad_gateway("Failed to search YouTube.")
    })?;

    Ok(HttpResponse::Ok().json(VideoSearchResponse {
        results: results.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MovieSearchQuery {
    #[serde(default)]
    pub query: Option<String>,
}

#[get("/movies/search")]
pub async fn search_movies(
    state: web::Data<AppState>,
    query: web::Query<MovieSearchQuery>,
) -> ApiResult<HttpResponse> {
    let term = query.query.as_deref().unwrap_or("").trim();
    if term.is_empty() {
        return Err(ApiError::bad_request("Search query is required."));
    }
    if term.chars().count() < 2 {
        return Err(ApiError::bad_request(
            "Search query must be at least 2 characters.",
        ));
    }
    if !state.radarr_configured {
        return Err(ApiError::service_unavailable(
            "Application has not been configured yet.",
        ));
    }

    let results = state.media.search_movies(term).await?;
    Ok(HttpResponse::Ok().json(MovieSearchResponse {
        results: results.into_iter().map(Into::into).collect(),
    }))
}
