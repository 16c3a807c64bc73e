//! ABOUTME: Shared fixtures for fa_jobs unit tests
//! ABOUTME: Stub media manager, pipeline context builder, and script helpers

use crate::model::{JobRequest, JobTarget, PlaylistMode, StandaloneNameMode};
use crate::pipeline::PipelineContext;
use crate::store::JobStore;
use async_trait::async_trait;
use fa_config::{DownloaderConfig, LibraryConfig};
use fa_media::{
    MediaManager, MovieLookup, MovieRecord, NewMovieOptions, QualityProfile, RootFolder,
};
use std::path::Path;
use std::sync::Arc;

/// Media manager that answers like an empty catalog. Standalone pipeline
/// tests never reach it.
pub(crate) struct StubMedia;

#[async_trait]
impl MediaManager for StubMedia {
    async fn get_movie(&self, id: u64) -> fa_core::Result<MovieRecord> {
        Err(fa_core::Error::NotFound(format!("movie {id}")))
    }

    async fn list_movies(&self) -> fa_core::Result<Vec<MovieRecord>> {
        Ok(Vec::new())
    }

    async fn lookup_tmdb(&self, _tmdb_id: u64) -> fa_core::Result<Option<MovieLookup>> {
        Ok(None)
    }

    async fn search_movies(&self, _term: &str) -> fa_core::Result<Vec<MovieLookup>> {
        Ok(Vec::new())
    }

    async fn add_movie(&self, _options: &NewMovieOptions) -> fa_core::Result<MovieRecord> {
        Err(fa_core::Error::NotFound("empty catalog".to_string()))
    }

    async fn root_folders(&self) -> fa_core::Result<Vec<RootFolder>> {
        Ok(Vec::new())
    }

    async fn quality_profiles(&self) -> fa_core::Result<Vec<QualityProfile>> {
        Ok(Vec::new())
    }
}

/// Pipeline context rooted at `library_path` with the given downloader binary.
pub(crate) fn test_context(library_path: &Path, yt_dlp_bin: &str) -> Arc<PipelineContext> {
    let library = LibraryConfig {
        file_paths: vec![library_path.to_string_lossy().to_string()],
        ..LibraryConfig::default()
    };
    let downloader = DownloaderConfig {
        yt_dlp_bin: yt_dlp_bin.to_string(),
        metadata_timeout_secs: 10,
        ..DownloaderConfig::default()
    };
    Arc::new(PipelineContext {
        store: Arc::new(JobStore::new(10)),
        media: Arc::new(StubMedia),
        library,
        downloader,
        debug_mode: false,
    })
}

pub(crate) fn standalone_request() -> JobRequest {
    JobRequest {
        url: "https://www.youtube.com/watch?v=abc".to_string(),
        target: JobTarget::Standalone {
            name_mode: StandaloneNameMode::Youtube,
            custom_name: None,
        },
        playlist_mode: PlaylistMode::Single,
    }
}

/// Write an executable shell script for use as a fake downloader.
pub(crate) fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, body).expect("write test script");
    let mut perms = std::fs::metadata(path).expect("stat test script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod test script");
}
