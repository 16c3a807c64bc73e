//! ABOUTME: Main binary for the fetcharr download bridge
//! ABOUTME: Starts the API server and the observability server

use std::process;
use std::sync::Arc;

use fa_config::Config;
use fa_core::telemetry;
use fa_jobs::{Dispatcher, JobStore, PipelineContext};
use fa_media::{MediaManager, RadarrClient, VideoSearch, YtDlpSearch};
use fa_obs::ObsState;
use fa_web::AppState;

#[tokio::main]
async fn main() {
    let env = std::env::var("FETCHARR_ENV").unwrap_or_else(|_| "development".to_string());
    telemetry::init_tracing(&env, "fetcharr");
    tracing::info!("fetcharr starting");

    // Load configuration - exit with non-zero if invalid
    let config = match Config::load() {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        obs_port = %config.server.obs_port,
        library_paths = config.library.file_paths.len(),
        radarr_configured = config.radarr.is_configured(),
        debug_mode = config.debug_mode,
        "Application configured and ready"
    );

    let media: Arc<dyn MediaManager> =
        match RadarrClient::new(config.radarr.url.clone(), config.radarr.api_key.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!("Failed to build Radarr client: {}", e);
                process::exit(1);
            }
        };
    let videos: Arc<dyn VideoSearch> =
        Arc::new(YtDlpSearch::new(config.downloader.yt_dlp_bin.clone()));

    let store = Arc::new(JobStore::new(config.library.max_jobs));
    let dispatcher = Arc::new(Dispatcher::new(config.library.max_concurrent_jobs));
    let pipeline = Arc::new(PipelineContext {
        store: Arc::clone(&store),
        media: Arc::clone(&media),
        library: config.library.clone(),
        downloader: config.downloader.clone(),
        debug_mode: config.debug_mode,
    });

    let obs_state = ObsState::new();
    let web_app_state = AppState {
        store,
        dispatcher,
        pipeline,
        media,
        videos,
        radarr_configured: config.radarr.is_configured(),
        debug_mode: config.debug_mode,
    };

    let obs_bind_addr = format!("0.0.0.0:{}", config.server.obs_port);
    let web_bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // Run both servers concurrently; if either exits, the process stops
    let obs_future = fa_obs::start_server(&obs_bind_addr, obs_state);
    let web_future = fa_web::start_server(&web_bind_addr, web_app_state);

    let result = tokio::select! {
        obs_result = obs_future => {
            tracing::error!("Observability server exited");
            obs_result
        }
        web_result = web_future => {
            tracing::error!("Web server exited");
            web_result
        }
    };

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        process::exit(1);
    }
}
