//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles all application settings from environment variables and files

use config::{Config as ConfigBuilder, Environment, File};
use fa_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Stream selection handed to the downloader. Prefers muxed or H.264/AAC
/// combinations at the highest resolution; AV1 "best" picks are often low
/// bitrate, so other codecs are only allowed as a last resort.
pub const DEFAULT_FORMAT_SELECTOR: &str = "bestvideo[height>=2160][vcodec^=avc1]+bestaudio[acodec^=mp4a]/\
     bestvideo[height>=1440][vcodec^=avc1]+bestaudio[acodec^=mp4a]/\
     bestvideo[height>=1080][vcodec^=avc1]+bestaudio[acodec^=mp4a]/\
     bestvideo[height>=720][vcodec^=avc1]+bestaudio[acodec^=mp4a]/\
     bestvideo[height>=2160]+bestaudio/\
     bestvideo[height>=1440]+bestaudio/\
     bestvideo[height>=1080]+bestaudio/\
     bestvideo[height>=720]+bestaudio/\
     95/best";

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub library: LibraryConfig,
    #[validate(nested)]
    pub downloader: DownloaderConfig,
    #[validate(nested)]
    pub radarr: RadarrConfig,
    /// Expose debug-classified subprocess lines in job logs
    pub debug_mode: bool,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[validate(range(min = 1, max = 65535))]
    pub obs_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            obs_port: 9000,
        }
    }
}

/// Media library configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LibraryConfig {
    /// Root directories downloads may be placed under. The first entry is
    /// the default target for standalone downloads.
    pub file_paths: Vec<String>,
    /// How many jobs the in-memory store retains before evicting the oldest
    #[validate(range(min = 1, max = 1000))]
    pub max_jobs: usize,
    /// Cap on concurrently running download pipelines
    #[validate(range(min = 1, max = 16))]
    pub max_concurrent_jobs: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            file_paths: Vec::new(),
            max_jobs: 50,
            max_concurrent_jobs: 2,
        }
    }
}

impl LibraryConfig {
    /// Default base path for standalone downloads
    pub fn primary_path(&self) -> Option<&str> {
        self.file_paths.first().map(String::as_str)
    }
}

/// External downloader configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DownloaderConfig {
    #[validate(length(min = 1))]
    pub yt_dlp_bin: String,
    #[validate(length(min = 1))]
    pub ffmpeg_bin: String,
    /// yt-dlp format selection expression
    #[validate(length(min = 1))]
    pub format_selector: String,
    /// Netscape-format cookie file passed to the downloader when set
    pub cookies_file: Option<String>,
    /// Deadline for metadata probes
    #[validate(range(min = 1, max = 3600))]
    pub metadata_timeout_secs: u64,
    /// Grace period between terminate and force-kill during cancellation
    #[validate(range(min = 1, max = 300))]
    pub kill_grace_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            yt_dlp_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            format_selector: DEFAULT_FORMAT_SELECTOR.to_string(),
            cookies_file: None,
            metadata_timeout_secs: 120,
            kill_grace_secs: 5,
        }
    }
}

/// Radarr connection configuration with secret redaction
#[derive(Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct RadarrConfig {
    /// Base URL without a trailing slash; empty means Radarr is not wired up
    pub url: String,
    pub api_key: String,
}

impl RadarrConfig {
    /// Whether enough is configured to talk to Radarr at all
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.api_key.is_empty()
    }
}

impl fmt::Debug for RadarrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadarrConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables and optional .env file
    pub fn load() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // Set defaults first
        builder = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.obs_port", 9000)?
            .set_default("library.file_paths", Vec::<String>::new())?
            .set_default("library.max_jobs", 50)?
            .set_default("library.max_concurrent_jobs", 2)?
            .set_default("downloader.yt_dlp_bin", "yt-dlp")?
            .set_default("downloader.ffmpeg_bin", "ffmpeg")?
            .set_default("downloader.format_selector", DEFAULT_FORMAT_SELECTOR)?
            .set_default("downloader.metadata_timeout_secs", 120)?
            .set_default("downloader.kill_grace_secs", 5)?
            .set_default("radarr.url", "")?
            .set_default("radarr.api_key", "")?
            .set_default("debug_mode", false)?;

        // Handle nested environment variables that don't work with the standard separator
        if let Ok(obs_port) = std::env::var("FETCHARR_SERVER_OBS_PORT") {
            builder = builder.set_override("server.obs_port", obs_port)?;
        }
        if let Ok(paths) = std::env::var("FETCHARR_LIBRARY_FILE_PATHS") {
            let paths: Vec<String> = paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            builder = builder.set_override("library.file_paths", paths)?;
        }
        if let Ok(max_jobs) = std::env::var("FETCHARR_LIBRARY_MAX_JOBS") {
            builder = builder.set_override("library.max_jobs", max_jobs)?;
        }
        if let Ok(concurrency) = std::env::var("FETCHARR_LIBRARY_MAX_CONCURRENT_JOBS") {
            builder = builder.set_override("library.max_concurrent_jobs", concurrency)?;
        }
        if let Ok(bin) = std::env::var("FETCHARR_DOWNLOADER_YT_DLP_BIN") {
            builder = builder.set_override("downloader.yt_dlp_bin", bin)?;
        }
        if let Ok(bin) = std::env::var("FETCHARR_DOWNLOADER_FFMPEG_BIN") {
            builder = builder.set_override("downloader.ffmpeg_bin", bin)?;
        }
        if let Ok(selector) = std::env::var("FETCHARR_DOWNLOADER_FORMAT_SELECTOR") {
            builder = builder.set_override("downloader.format_selector", selector)?;
        }
        if let Ok(cookies) = std::env::var("FETCHARR_DOWNLOADER_COOKIES_FILE") {
            builder = builder.set_override("downloader.cookies_file", cookies)?;
        }
        if let Ok(timeout) = std::env::var("FETCHARR_DOWNLOADER_METADATA_TIMEOUT_SECS") {
            builder = builder.set_override("downloader.metadata_timeout_secs", timeout)?;
        }
        if let Ok(grace) = std::env::var("FETCHARR_DOWNLOADER_KILL_GRACE_SECS") {
            builder = builder.set_override("downloader.kill_grace_secs", grace)?;
        }
        if let Ok(api_key) = std::env::var("FETCHARR_RADARR_API_KEY") {
            builder = builder.set_override("radarr.api_key", api_key)?;
        }
        if let Ok(debug_mode) = std::env::var("FETCHARR_DEBUG_MODE") {
            builder = builder.set_override("debug_mode", debug_mode)?;
        }

        // Try to load from .env file if it exists (optional)
        if std::path::Path::new(".env").exists() {
            builder = builder.add_source(File::with_name(".env").required(false));
        }

        // Load from environment variables with FETCHARR_ prefix (highest priority)
        builder = builder.add_source(
            Environment::with_prefix("FETCHARR")
                .try_parsing(true)
                .separator("_"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let mut parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        // Normalize the Radarr URL the way the API client expects it
        parsed.radarr.url = parsed.radarr.url.trim().trim_end_matches('/').to_string();
        parsed.radarr.api_key = parsed.radarr.api_key.trim().to_string();

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }
}
