//! ABOUTME: Movie catalog proxy endpoints for lookups and quick creation
//! ABOUTME: Fills root folder and quality profile defaults from the catalog

use actix_web::{get, post, web, HttpResponse};
use fa_media::NewMovieOptions;
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddMovieRequest, MovieCreatedResponse, MovieLookupResponse, MovieOptionsResponse,
};
use crate::AppState;

fn require_configured(state: &AppState) -> ApiResult<()> {
    if state.radarr_configured {
        Ok(())
    } else {
        Err(ApiError::service_unavailable(
            "Application has not been configured yet.",
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQuery {
    #[serde(default)]
    pub tmdb_id: Option<String>,
}

#[get("/movies/lookup")]
pub async fn lookup_movie(
    state: web::Data<AppState>,
    query: web::Query<LookupQuery>,
) -> ApiResult<HttpResponse> {
    let raw = query.tmdb_id.as_deref().unwrap_or("").trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("TMDb ID is required."));
    }
    let tmdb_id: u64 = raw
        .parse()
        .map_err(|_| ApiError::bad_request("TMDb ID must be numeric."))?;
    require_configured(&state)?;

    let lookup = state
        .media
        .lookup_tmdb(tmdb_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Movie not found on TMDb."))?;

    Ok(HttpResponse::Ok().json(MovieLookupResponse {
        movie: lookup.into(),
    }))
}

#[get("/movies/options")]
pub async fn movie_options(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    require_configured(&state)?;

    let root_folders = state.media.root_folders().await?;
    let quality_profiles = state.media.quality_profiles().await?;

    Ok(HttpResponse::Ok().json(MovieOptionsResponse {
        root_folders: root_folders.into_iter().map(Into::into).collect(),
        quality_profiles: quality_profiles.into_iter().map(Into::into).collect(),
    }))
}

#[post("/movies")]
pub async fn add_movie(
    state: web::Data<AppState>,
    body: web::Json<AddMovieRequest>,
) -> ApiResult<HttpResponse> {
    require_configured(&state)?;
    let body = body.into_inner();

    let explicit_root = body
        .root_folder_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let needs_defaults = explicit_root.is_none() || body.quality_profile_id.is_none();

    let root_folder_path = match explicit_root {
        Some(path) => path,
        None => {
            let folders = state.media.root_folders().await?;
            folders
                .iter()
                .find(|f| f.accessible)
                .or_else(|| folders.first())
                .map(|f| f.path.clone())
                .ok_or_else(|| {
                    ApiError::service_unavailable(
                        "Radarr does not have any root folders configured.",
                    )
                })?
        }
    };

    let quality_profile_id = match body.quality_profile_id {
        Some(id) => id,
        None => {
            let profiles = state.media.quality_profiles().await?;
            profiles.first().map(|p| p.id).ok_or_else(|| {
                ApiError::service_unavailable(
                    "Radarr does not have any quality profiles configured.",
                )
            })?
        }
    };

    let options = NewMovieOptions {
        tmdb_id: body.tmdb_id,
        quality_profile_id,
        root_folder_path,
        monitored: body.monitored.unwrap_or(true),
        // When the caller filled everything in themselves, trust their
        // search choice; defaulted submissions kick off a search.
        search: body.search.unwrap_or(needs_defaults),
    };

    let movie = state.media.add_movie(&options).await?;
    info!(movie_id = movie.id, tmdb_id = options.tmdb_id, "Movie added to catalog");

    Ok(HttpResponse::Ok().json(MovieCreatedResponse {
        movie: movie.into(),
    }))
}
