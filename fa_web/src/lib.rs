//! ABOUTME: Web API layer wiring job orchestration to HTTP
//! ABOUTME: Provides REST endpoints and OpenAPI documentation

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use fa_core::Result;
use fa_jobs::{Dispatcher, JobStore, PipelineContext};
use fa_media::{MediaManager, VideoSearch};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
pub mod logs;
pub mod models;
pub mod routes;
pub mod urls;

use routes::{jobs, movies, public, search};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub pipeline: Arc<PipelineContext>,
    pub media: Arc<dyn MediaManager>,
    pub videos: Arc<dyn VideoSearch>,
    pub radarr_configured: bool,
    pub debug_mode: bool,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        jobs::create_job,
        jobs::list_jobs,
        jobs::get_job,
        jobs::cancel_job,
        public::health,
    ),
    components(
        schemas(
            models::CreateJobRequest,
            models::JobView,
            models::JobEnvelope,
            models::JobListEnvelope,
            models::CancelEnvelope,
            models::ProblemDetails,
        ),
    ),
    tags(
        (name = "jobs", description = "Download job lifecycle"),
        (name = "public", description = "Public endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main web application service factory
pub fn create_app(
    state: AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .wrap(actix_web::middleware::Logger::default())
        .service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .service(
            web::scope("/api")
                .service(public::health)
                .service(jobs::create_job)
                .service(jobs::list_jobs)
                .service(jobs::get_job)
                .service(jobs::cancel_job)
                .service(search::search_videos)
                .service(search::search_movies)
                .service(movies::lookup_movie)
                .service(movies::movie_options)
                .service(movies::add_movie),
        )
}

/// Start the web server
pub async fn start_server(bind_addr: &str, state: AppState) -> Result<()> {
    tracing::info!("Starting web server on {}", bind_addr);

    HttpServer::new(move || create_app(state.clone()))
        .bind(bind_addr)
        .map_err(|e| fa_core::Error::Config(format!("Failed to bind web server: {}", e)))?
        .run()
        .await
        .map_err(|e| fa_core::Error::Config(format!("Web server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use async_trait::async_trait;
    use fa_config::{DownloaderConfig, LibraryConfig};
    use fa_jobs::{JobRequest, JobTarget, PlaylistMode, StandaloneNameMode};
    use fa_media::{
        MovieLookup, MovieRecord, NewMovieOptions, QualityProfile, RootFolder, SearchResult,
    };
    use serde_json::{json, Value};

    struct FakeMedia {
        movies: Vec<MovieRecord>,
    }

    #[async_trait]
    impl MediaManager for FakeMedia {
        async fn get_movie(&self, id: u64) -> fa_core::Result<MovieRecord> {
            self.movies
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| fa_core::Error::NotFound(format!("movie {id}")))
        }

        async fn list_movies(&self) -> fa_core::Result<Vec<MovieRecord>> {
            Ok(self.movies.clone())
        }

        async fn lookup_tmdb(&self, tmdb_id: u64) -> fa_core::Result<Option<MovieLookup>> {
            if tmdb_id == 1398 {
                Ok(Some(MovieLookup {
                    title: "Stalker".to_string(),
                    year: Some(1979),
                    tmdb_id: Some(1398),
                    title_slug: Some("stalker-1398".to_string()),
                    images: Vec::new(),
                    minimum_availability: None,
                    overview: Some("A guide leads two men into the Zone.".to_string()),
                    runtime: Some(162),
                    genres: vec!["Drama".to_string()],
                    remote_poster: None,
                }))
            } else {
                Ok(None)
            }
        }

        async fn search_movies(&self, term: &str) -> fa_core::Result<Vec<MovieLookup>> {
            if term == "stalker" {
                Ok(vec![MovieLookup {
                    title: "Stalker".to_string(),
                    year: Some(1979),
                    tmdb_id: Some(1398),
                    title_slug: None,
                    images: Vec::new(),
                    minimum_availability: None,
                    overview: None,
                    runtime: None,
                    genres: Vec::new(),
                    remote_poster: None,
                }])
            } else {
                Ok(Vec::new())
            }
        }

        async fn add_movie(&self, options: &NewMovieOptions) -> fa_core::Result<MovieRecord> {
            Ok(MovieRecord {
                id: 99,
                title: "Stalker".to_string(),
                year: Some(1979),
                tmdb_id: Some(options.tmdb_id),
                path: Some(format!("{}/Stalker (1979)", options.root_folder_path)),
            })
        }

        async fn root_folders(&self) -> fa_core::Result<Vec<RootFolder>> {
            Ok(vec![RootFolder {
                id: 1,
                path: "/movies".to_string(),
                accessible: true,
            }])
        }

        async fn quality_profiles(&self) -> fa_core::Result<Vec<QualityProfile>> {
            Ok(vec![QualityProfile {
                id: 4,
                name: "HD-1080p".to_string(),
            }])
        }
    }

    struct FakeVideos;

    #[async_trait]
    impl VideoSearch for FakeVideos {
        async fn search(
            &self,
            query: &str,
            _limit: usize,
        ) -> fa_core::Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                id: Some("abc123".to_string()),
                title: Some(format!("{query} trailer")),
                url: "https://www.youtube.com/watch?v=abc123".to_string(),
                uploader: Some("Mosfilm".to_string()),
                view_count: Some(1000),
                duration: Some(123.0),
            }])
        }
    }

    fn test_state(radarr_configured: bool) -> AppState {
        let store = Arc::new(JobStore::new(10));
        let media: Arc<dyn MediaManager> = Arc::new(FakeMedia {
            movies: vec![MovieRecord {
                id: 7,
                title: "Stalker".to_string(),
                year: Some(1979),
                tmdb_id: Some(1398),
                path: Some("/movies/Stalker (1979)".to_string()),
            }],
        });
        let pipeline = Arc::new(PipelineContext {
            store: Arc::clone(&store),
            media: Arc::clone(&media),
            library: LibraryConfig::default(),
            downloader: DownloaderConfig::default(),
            debug_mode: false,
        });
        AppState {
            store,
            dispatcher: Arc::new(Dispatcher::new(2)),
            pipeline,
            media,
            videos: Arc::new(FakeVideos),
            radarr_configured,
            debug_mode: false,
        }
    }

    fn standalone_request() -> JobRequest {
        JobRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            target: JobTarget::Standalone {
                name_mode: StandaloneNameMode::Youtube,
                custom_name: None,
            },
            playlist_mode: PlaylistMode::Single,
        }
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_web::test]
    async fn test_create_standalone_job_is_accepted() {
        let state = test_state(false);
        let app = test::init_service(create_app(state.clone())).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/jobs")
                .set_json(json!({
                    "url": "youtube.com/watch?v=abc",
                    "standalone": true,
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["job"]["status"], "queued");
        assert_eq!(body["debug_mode"], false);
        // "Job queued." is a plain line with no milestone phrase
        assert_eq!(body["job"]["logs"], json!([]));
        assert_eq!(state.store.list().len(), 1);
    }

    #[actix_web::test]
    async fn test_create_rejects_unsupported_host() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/jobs")
                .set_json(json!({"url": "https://example.com/clip", "movieId": 7}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["detail"],
            "Only YouTube, Vimeo, or Dailymotion URLs are supported."
        );
    }

    #[actix_web::test]
    async fn test_create_requires_movie_selection() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/jobs")
                .set_json(json!({"url": "https://youtu.be/abc"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_create_movie_job_needs_configured_radarr() {
        let app = test::init_service(create_app(test_state(false))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/jobs")
                .set_json(json!({"url": "https://youtu.be/abc", "movieId": 7}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_get_unknown_job_is_404() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/jobs/01JABCDEFGHJKMNPQRSTVWXYZ0")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Job not found.");
    }

    #[actix_web::test]
    async fn test_list_jobs_newest_first() {
        let state = test_state(true);
        let first = state.store.create(standalone_request());
        let second = state.store.create(standalone_request());

        let app = test::init_service(create_app(state)).await;
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/jobs").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["jobs"][0]["id"], second.id.to_string());
        assert_eq!(body["jobs"][1]["id"], first.id.to_string());
    }

    #[actix_web::test]
    async fn test_cancel_terminal_job_conflicts() {
        let state = test_state(true);
        let job = state.store.create(standalone_request());
        state.store.mark_complete(&job.id);

        let app = test::init_service(create_app(state)).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/jobs/{}/cancel", job.id))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Job is not active and cannot be cancelled.");
    }

    #[actix_web::test]
    async fn test_cancel_active_job_without_worker_conflicts() {
        let state = test_state(true);
        // Created directly in the store, never dispatched
        let job = state.store.create(standalone_request());

        let app = test::init_service(create_app(state)).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/jobs/{}/cancel", job.id))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Job worker is no longer active.");
    }

    #[actix_web::test]
    async fn test_cancel_unknown_job_is_404() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/jobs/not-a-real-id/cancel")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_video_search_requires_two_characters() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/videos/search?q=a")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_video_search_returns_results() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/videos/search?q=stalker")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["results"][0]["title"], "stalker trailer");
        assert_eq!(body["results"][0]["viewCount"], 1000);
    }

    #[actix_web::test]
    async fn test_movie_search_and_lookup() {
        let app = test::init_service(create_app(test_state(true))).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/movies/search?query=stalker")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["results"][0]["tmdbId"], 1398);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/movies/lookup?tmdbId=1398")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["movie"]["title"], "Stalker");
        assert_eq!(body["movie"]["minimumAvailability"], "released");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/movies/lookup?tmdbId=999")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_add_movie_fills_defaults() {
        let app = test::init_service(create_app(test_state(true))).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/movies")
                .set_json(json!({"tmdbId": 1398}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["movie"]["id"], 99);
        assert_eq!(body["movie"]["tmdbId"], 1398);
    }
}
