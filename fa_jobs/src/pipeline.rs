//! ABOUTME: Per-job pipeline, fetch then optional merge then placement
//! ABOUTME: Drives one job through the status machine with cancellation checkpoints

use crate::merger::{MergeItem, PlaylistMerger, StagingDir};
use crate::model::{JobRequest, JobTarget, PlaylistMode, StandaloneNameMode};
use crate::store::JobStore;
use fa_config::{DownloaderConfig, LibraryConfig};
use fa_core::{Error, Id, Result};
use fa_media::{resolve_movie, MediaManager};
use fa_naming::{movie_stem, sanitize_filename, unique_folder_in_dir, unique_stem_in_dir};
use fa_proc::{CommandSpec, LineKind, LogLine, RunOutcome};
use metrics::counter;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Shared collaborators handed to every pipeline run
pub struct PipelineContext {
    pub store: Arc<JobStore>,
    pub media: Arc<dyn MediaManager>,
    pub library: LibraryConfig,
    pub downloader: DownloaderConfig,
    pub debug_mode: bool,
}

/// Run one job end to end, recording every outcome in the store.
#[instrument(skip(ctx, cancel), fields(job_id = %job_id))]
pub async fn run_job(ctx: Arc<PipelineContext>, job_id: Id, cancel: CancellationToken) {
    let Some(job) = ctx.store.get(&job_id) else {
        warn!(job_id = %job_id, "Dispatched job no longer exists");
        return;
    };
    let request = job.request.clone();

    // A cancel that landed while the job waited for a slot must not let it
    // pass through processing.
    if cancel.is_cancelled() {
        ctx.store.append_log(&job_id, "Job cancelled.");
        ctx.store.mark_cancelled(&job_id, "Job cancelled by user.");
        counter!("jobs_cancelled_total").increment(1);
        info!(job_id = %job_id, "Job cancelled before start");
        return;
    }

    ctx.store.mark_processing(&job_id);
    ctx.store.set_progress(&job_id, 1.0);

    match execute(&ctx, &job_id, &request, &cancel).await {
        Ok(final_path) => {
            ctx.store.set_progress(&job_id, 100.0);
            ctx.store.append_log(
                &job_id,
                format!("Success! Video saved as '{}'.", final_path.display()),
            );
            ctx.store.mark_complete(&job_id);
            counter!("jobs_completed_total").increment(1);
            info!(job_id = %job_id, path = %final_path.display(), "Job completed");
        }
        Err(e) if e.is_cancelled() => {
            ctx.store.append_log(&job_id, "Job cancelled.");
            ctx.store.mark_cancelled(&job_id, "Job cancelled by user.");
            counter!("jobs_cancelled_total").increment(1);
            info!(job_id = %job_id, "Job cancelled");
        }
        Err(e) => {
            let message = e.to_string();
            ctx.store.append_log(&job_id, format!("ERROR: {message}"));
            ctx.store.mark_failed(&job_id, message.clone());
            counter!("jobs_failed_total").increment(1);
            warn!(job_id = %job_id, error = %message, "Job failed");
        }
    }
}

/// Destination resolved from the job target
struct Placement {
    /// Directory the final file lands in
    target_dir: PathBuf,
    /// Directory the downloader writes into (same as target_dir except for
    /// playlist staging)
    download_dir: PathBuf,
    /// Filename stem the placed file must carry, without extension
    canonical_stem: String,
    /// Stem used for the raw download before renaming
    download_stem: String,
}

async fn execute(
    ctx: &PipelineContext,
    job_id: &Id,
    request: &JobRequest,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let log = |message: String| ctx.store.append_log(job_id, message);

    ensure_not_cancelled(ctx, job_id, cancel)?;

    // Step 1: resolve the destination directory and canonical stem.
    let (target_dir, canonical_seed) = resolve_target(ctx, job_id, request).await?;
    ctx.store.set_progress(job_id, 10.0);

    ensure_not_cancelled(ctx, job_id, cancel)?;

    // Step 2: probe metadata. Failures degrade to warnings; merge mode needs
    // the playlist entries, everything else is best-effort.
    let merge = request.playlist_mode == PlaylistMode::Merge;
    if merge {
        log("Playlist download requested; videos will be merged into a single file.".to_string());
    }
    let probe = probe_metadata(ctx, job_id, &request.url, merge, cancel).await?;

    ensure_not_cancelled(ctx, job_id, cancel)?;

    // Step 3: derive the final names from the probe and the request.
    let placement = resolve_names(ctx, job_id, request, &probe, target_dir, canonical_seed)?;

    if let Some(format) = &probe.format {
        log(format!(
            "Resolved YouTube format: id={}, resolution={}, video_codec={}, audio_codec={}, filesize={}",
            format.format_id, format.resolution, format.video_codec, format.audio_codec, format.filesize
        ));
    } else {
        log("yt-dlp did not report a resolved format; proceeding with download.".to_string());
    }

    ensure_not_cancelled(ctx, job_id, cancel)?;
    ctx.store.set_progress(job_id, 20.0);

    // Step 4: fetch. Either a single streamed download or the playlist merge.
    let produced = if merge {
        // Staging lives under the download dir; the guard removes it on every
        // exit path, so only files moved out survive.
        let staging = StagingDir::create(
            placement
                .download_dir
                .join(format!(".fetcharr_playlist_{job_id}")),
        )?;
        log(format!(
            "Playlist merge enabled. Downloads will be staged in '{}'.",
            staging
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        ));

        if probe.items.is_empty() {
            return Err(Error::Process(
                "Could not enumerate playlist items for merging.".to_string(),
            ));
        }
        log(format!(
            "Merging playlist videos with ffmpeg (segments: {}).",
            probe.items.len()
        ));

        let merger = PlaylistMerger::new(
            &ctx.downloader.yt_dlp_bin,
            &ctx.downloader.ffmpeg_bin,
            &ctx.downloader.format_selector,
            ctx.downloader.cookies_file.clone(),
            Duration::from_secs(ctx.downloader.kill_grace_secs),
        );
        let mut sink = LogSink::new(ctx, *job_id);
        let merged = merger
            .merge_all(&probe.items, staging.path(), cancel, |line| {
                sink.handle(line)
            })
            .await?;
        log("Merging playlist videos completed successfully.".to_string());

        // Move the merged file out of staging before the guard removes it.
        let ext = merged
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let parked = placement
            .download_dir
            .join(format!("{}.{}", placement.download_stem, ext));
        std::fs::rename(&merged, &parked)
            .map_err(|e| Error::Placement(format!("Failed to move merged file: {e}")))?;
        vec![parked]
    } else {
        fetch_single(ctx, job_id, request, &placement, cancel).await?
    };

    if cancel.is_cancelled() {
        remove_files(&produced);
        cleanup_fragments(&placement.download_dir, &placement.download_stem);
        return Err(Error::Cancelled("Download stopped.".to_string()));
    }

    // Step 5: pick the real output among what the downloader produced.
    let final_candidates: Vec<PathBuf> = produced
        .iter()
        .filter(|p| !is_intermediate_file(p))
        .cloned()
        .collect();
    let target_path = pick_newest(if final_candidates.is_empty() {
        &produced
    } else {
        &final_candidates
    })
    .ok_or_else(|| {
        Error::Process("Download completed but the output file could not be located.".to_string())
    })?;
    let extension = target_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    record_format_metadata(ctx, job_id, extension.as_deref(), probe.format.as_ref());

    // Step 6: rename into the canonical Radarr-visible name.
    let final_path = place_file(ctx, job_id, &placement, &target_path, extension.as_deref())?;

    if cancel.is_cancelled() {
        let _ = std::fs::remove_file(&final_path);
        return Err(Error::Cancelled("Download stopped.".to_string()));
    }

    // Leftover format fragments around the final file are noise; drop them.
    for leftover in &produced {
        if leftover == &final_path || !is_intermediate_file(leftover) {
            continue;
        }
        let _ = std::fs::remove_file(leftover);
    }

    Ok(final_path)
}

fn ensure_not_cancelled(
    ctx: &PipelineContext,
    job_id: &Id,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        ctx.store
            .append_log(job_id, "Cancellation acknowledged; stopping job.");
        return Err(Error::Cancelled("Job stopped at checkpoint.".to_string()));
    }
    Ok(())
}

/// Resolve the destination directory and, for movie targets, the canonical
/// stem seed. Standalone targets get their stem after the metadata probe.
async fn resolve_target(
    ctx: &PipelineContext,
    job_id: &Id,
    request: &JobRequest,
) -> Result<(PathBuf, Option<String>)> {
    let log = |message: String| ctx.store.append_log(job_id, message);

    match &request.target {
        JobTarget::Standalone { .. } => {
            let base = ctx.library.primary_path().ok_or_else(|| {
                Error::Validation(
                    "Standalone downloads require at least one accessible library path."
                        .to_string(),
                )
            })?;
            log("Standalone download requested; skipping Radarr library lookup.".to_string());
            log(format!("Standalone base path resolved to '{base}'."));
            Ok((PathBuf::from(base), None))
        }
        JobTarget::Movie { extra, .. } => {
            let selector = request
                .target
                .movie_selector()
                .unwrap_or_default();
            let resolved = resolve_movie(ctx.media.as_ref(), &selector).await?;
            let Some(movie) = resolved else {
                return Err(Error::Validation(
                    "No movie selected. Please choose a movie from the suggestions list."
                        .to_string(),
                ));
            };
            log(format!("Fetching Radarr details for movie ID {}.", movie.id));
            let movie = ctx.media.get_movie(movie.id).await.map_err(|e| {
                Error::Upstream(format!(
                    "Could not retrieve movie info from Radarr (ID {}): {e}",
                    movie.id
                ))
            })?;

            let movie_path = movie.path.clone().ok_or_else(|| {
                Error::Placement(format!(
                    "Movie '{}' has no folder assigned in Radarr.",
                    movie.title
                ))
            })?;
            let movie_path = PathBuf::from(movie_path);
            if !movie_path.is_dir() {
                std::fs::create_dir_all(&movie_path).map_err(|e| {
                    Error::Placement(format!(
                        "Movie folder not found on disk and could not be created: {e}"
                    ))
                })?;
                log(format!("Created movie folder at '{}'.", movie_path.display()));
            }
            log(format!("Movie path resolved to '{}'.", movie_path.display()));

            let mut target_dir = movie_path;
            if let Some(extra) = extra {
                let subfolder = extra.extra_type.folder();
                target_dir = target_dir.join(subfolder);
                std::fs::create_dir_all(&target_dir)
                    .map_err(|e| Error::Placement(format!("Failed to create '{subfolder}': {e}")))?;
                log(format!("Storing video in subfolder '{subfolder}'."));
            } else {
                log("Treating video as main video file.".to_string());
            }

            let stem = movie_stem(&movie.title, movie.year, movie.tmdb_id);
            log(format!("Resolved Radarr movie stem to '{stem}'."));

            let canonical_stem = match extra {
                Some(extra) => {
                    let label = extra
                        .name
                        .as_deref()
                        .map(sanitize_filename)
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| extra.extra_type.label().to_string());
                    log(format!("Using extra label '{label}'."));
                    format!("{stem} {label}")
                }
                None => stem,
            };

            Ok((target_dir, Some(canonical_stem)))
        }
    }
}

/// What the metadata probe learned about the URL
#[derive(Debug, Default)]
struct ProbeOutcome {
    /// Title of the single video, when reported
    title: Option<String>,
    /// Playlist title, when the URL is a playlist
    playlist_title: Option<String>,
    /// Ordered playlist entries, only populated in merge mode
    items: Vec<MergeItem>,
    format: Option<ResolvedFormat>,
}

#[derive(Debug, Clone)]
struct ResolvedFormat {
    format_id: String,
    resolution: String,
    video_codec: String,
    audio_codec: String,
    filesize: String,
}

/// Query yt-dlp for metadata without downloading. Timeouts and non-zero
/// exits degrade to warnings; only cancellation aborts the job here.
async fn probe_metadata(
    ctx: &PipelineContext,
    job_id: &Id,
    url: &str,
    merge: bool,
    cancel: &CancellationToken,
) -> Result<ProbeOutcome> {
    let mut spec = CommandSpec::new(&ctx.downloader.yt_dlp_bin);
    if let Some(cookies) = &ctx.downloader.cookies_file {
        spec = spec.args(["--cookies", cookies]);
    }
    let spec = spec
        .args(["--print-json", "--skip-download"])
        .args(["-f", &ctx.downloader.format_selector])
        .arg(if merge { "--yes-playlist" } else { "--no-playlist" })
        .arg(url)
        .kill_after(Duration::from_secs(ctx.downloader.kill_grace_secs));

    let deadline = Duration::from_secs(ctx.downloader.metadata_timeout_secs);
    let output = fa_proc::run_collected(spec, deadline, cancel).await?;

    if output.cancelled {
        return Err(Error::Cancelled("Metadata probe stopped.".to_string()));
    }
    if output.timed_out {
        ctx.store.append_log(
            job_id,
            format!(
                "WARNING: yt-dlp metadata query exceeded {} seconds; continuing without metadata.",
                ctx.downloader.metadata_timeout_secs
            ),
        );
        return Ok(ProbeOutcome::default());
    }
    if !output.success() {
        ctx.store.append_log(
            job_id,
            format!(
                "WARNING: yt-dlp metadata query exited with status {:?}; continuing without metadata.",
                output.exit_code
            ),
        );
        return Ok(ProbeOutcome::default());
    }

    if output.truncated {
        // A merged playlist enumerated from a partial listing would silently
        // drop trailing items.
        if merge {
            return Err(Error::Process(
                "yt-dlp metadata output was truncated; cannot reliably enumerate playlist items for merging.".to_string(),
            ));
        }
        ctx.store.append_log(
            job_id,
            "WARNING: yt-dlp metadata output was truncated; continuing with partial metadata.",
        );
    }

    for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
        ctx.store
            .append_log(job_id, format!("DEBUG: yt-dlp metadata: {}", line.trim()));
    }

    let entries = parse_probe_entries(&output.stdout);
    if entries.is_empty() {
        return Ok(ProbeOutcome::default());
    }
    ctx.store
        .append_log(job_id, "YouTube metadata retrieved successfully.");

    // Prefer the last entry that is an actual video over playlist wrappers.
    let preferred = entries
        .iter()
        .rev()
        .find(|entry| {
            let kind = entry
                .get("_type")
                .and_then(Value::as_str)
                .unwrap_or("video")
                .to_lowercase();
            !matches!(kind.as_str(), "playlist" | "multi_video" | "multi")
        })
        .or_else(|| entries.last());

    let mut probe = ProbeOutcome::default();
    if let Some(entry) = preferred {
        probe.title = entry
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);
        probe.playlist_title = entry
            .get("playlist_title")
            .or_else(|| entry.get("playlist"))
            .and_then(Value::as_str)
            .map(str::to_string);
        probe.format = resolve_format(entry);
    }
    if merge {
        probe.items = entries
            .iter()
            .filter_map(|entry| {
                let kind = entry
                    .get("_type")
                    .and_then(Value::as_str)
                    .unwrap_or("video")
                    .to_lowercase();
                if matches!(kind.as_str(), "playlist" | "multi_video" | "multi") {
                    return None;
                }
                let url = entry
                    .get("webpage_url")
                    .or_else(|| entry.get("url"))
                    .and_then(Value::as_str)?;
                Some(MergeItem {
                    url: url.to_string(),
                    title: entry
                        .get("title")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect();
    }
    Ok(probe)
}

fn parse_probe_entries(stdout: &str) -> Vec<Value> {
    let mut entries: Vec<Value> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
        .collect();
    // Some versions emit one pretty-printed blob instead of JSON lines
    if entries.is_empty() {
        if let Ok(blob) = serde_json::from_str::<Value>(stdout) {
            if blob.is_object() {
                entries.push(blob);
            }
        }
    }
    entries
}

fn resolve_format(entry: &Value) -> Option<ResolvedFormat> {
    let format_id = entry.get("format_id").and_then(Value::as_str)?;
    let width = entry.get("width").and_then(Value::as_u64);
    let height = entry.get("height").and_then(Value::as_u64);
    let resolution = match (width, height) {
        (Some(w), Some(h)) => format!("{w}x{h}"),
        (_, Some(h)) => format!("{h}p"),
        _ => "unknown".to_string(),
    };
    let filesize = entry
        .get("filesize")
        .or_else(|| entry.get("filesize_approx"))
        .and_then(Value::as_f64);
    Some(ResolvedFormat {
        format_id: format_id.to_string(),
        resolution,
        video_codec: entry
            .get("vcodec")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        audio_codec: entry
            .get("acodec")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        filesize: format_filesize(filesize),
    })
}

fn format_filesize(value: Option<f64>) -> String {
    let Some(mut size) = value.filter(|v| *v > 0.0) else {
        return "unknown".to_string();
    };
    let units = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut unit = 0;
    while size >= 1024.0 && unit < units.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", units[unit])
}

/// Turn the probe and request into concrete directory and stem choices.
fn resolve_names(
    ctx: &PipelineContext,
    job_id: &Id,
    request: &JobRequest,
    probe: &ProbeOutcome,
    target_dir: PathBuf,
    canonical_seed: Option<String>,
) -> Result<Placement> {
    let log = |message: String| ctx.store.append_log(job_id, message);
    let merge = request.playlist_mode == PlaylistMode::Merge;
    let default_label = if merge { "Playlist" } else { "Video" };

    // The descriptive name: explicit request naming wins over probe titles.
    let mut descriptive = match &request.target {
        JobTarget::Movie {
            extra: Some(extra), ..
        } => extra.name.clone().unwrap_or_default(),
        JobTarget::Standalone {
            name_mode: StandaloneNameMode::Custom,
            custom_name,
        } => custom_name.clone().unwrap_or_default(),
        _ => String::new(),
    };
    descriptive = descriptive.trim().to_string();
    if !descriptive.is_empty() {
        log(format!("Using custom descriptive name '{descriptive}'."));
    } else {
        let candidate = if merge {
            probe
                .playlist_title
                .clone()
                .or_else(|| probe.title.clone())
        } else {
            probe.title.clone()
        };
        match candidate.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(title) => {
                log(format!("Using YouTube title '{title}'."));
                descriptive = title;
            }
            None => {
                let subject = if merge { "playlist" } else { "video" };
                log(format!(
                    "WARNING: yt-dlp did not provide a {subject} title. Using fallback name '{default_label}'."
                ));
                descriptive = default_label.to_string();
            }
        }
    }
    descriptive = sanitize_filename(&descriptive);
    if descriptive.is_empty() {
        descriptive = default_label.to_string();
    }

    let filename_base = match request.target.extra() {
        Some(extra) => {
            let suffix = extra
                .name
                .as_deref()
                .map(sanitize_filename)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| extra.extra_type.key().to_string());
            format!("{descriptive}-{suffix}")
        }
        None => descriptive.clone(),
    };
    let filename_base = if filename_base.is_empty() {
        "Video".to_string()
    } else {
        filename_base
    };

    if request.target.is_standalone() {
        // Standalone downloads live in their own folder named after the video.
        let folder_name = sanitize_filename(&descriptive);
        let folder_name = if folder_name.is_empty() {
            filename_base.clone()
        } else {
            folder_name
        };
        let folder = unique_folder_in_dir(&target_dir, &folder_name);
        let created = !folder.is_dir();
        std::fs::create_dir_all(&folder).map_err(|e| {
            Error::Placement(format!(
                "Failed to create standalone folder '{}': {e}",
                folder.display()
            ))
        })?;
        if created {
            log(format!("Created standalone folder at '{}'.", folder.display()));
        } else {
            log(format!("Standalone folder resolved to '{}'.", folder.display()));
        }
        let stem = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(folder_name);
        Ok(Placement {
            target_dir: folder.clone(),
            download_dir: folder,
            canonical_stem: stem.clone(),
            download_stem: stem,
        })
    } else {
        let canonical_stem = canonical_seed.unwrap_or_else(|| filename_base.clone());
        let download_stem = unique_stem_in_dir(&target_dir, &filename_base)?;
        if download_stem != filename_base {
            log(format!(
                "File stem '{filename_base}' already exists. Selected new filename stem '{download_stem}'."
            ));
        }
        Ok(Placement {
            target_dir: target_dir.clone(),
            download_dir: target_dir,
            canonical_stem,
            download_stem,
        })
    }
}

/// Streamed log handling for a running downloader. Progress lines update the
/// job's percentage and, outside debug mode, collapse into one log entry.
struct LogSink<'a> {
    ctx: &'a PipelineContext,
    job_id: Id,
    progress_log_active: bool,
}

impl<'a> LogSink<'a> {
    fn new(ctx: &'a PipelineContext, job_id: Id) -> Self {
        Self {
            ctx,
            job_id,
            progress_log_active: false,
        }
    }

    fn handle(&mut self, line: LogLine) {
        if let Some(progress) = fa_proc::extract_progress(&line.text) {
            self.ctx.store.set_progress(&self.job_id, progress);
        }
        match line.kind {
            LineKind::Progress => {
                let compact = !self.ctx.debug_mode;
                if compact && self.progress_log_active {
                    self.ctx.store.replace_last_log(&self.job_id, line.text);
                } else {
                    self.ctx.store.append_log(&self.job_id, line.text);
                    self.progress_log_active = true;
                }
            }
            _ => {
                self.ctx.store.append_log(&self.job_id, line.rendered());
                self.progress_log_active = false;
            }
        }
    }
}

/// Run a single-video download with streamed output.
async fn fetch_single(
    ctx: &PipelineContext,
    job_id: &Id,
    request: &JobRequest,
    placement: &Placement,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    // Percent signs would be interpreted as yt-dlp template fields
    let template_base = placement.download_stem.replace('%', "%%");
    let template = placement
        .download_dir
        .join(format!("{template_base}.%(ext)s"));

    let mut spec = CommandSpec::new(&ctx.downloader.yt_dlp_bin);
    if let Some(cookies) = &ctx.downloader.cookies_file {
        spec = spec.args(["--cookies", cookies]);
    }
    let spec = spec
        .arg("--newline")
        .args(["-f", &ctx.downloader.format_selector])
        .arg("--no-playlist")
        .args(["-o", &template.to_string_lossy()])
        .arg(&request.url)
        .cwd(&placement.download_dir)
        .kill_after(Duration::from_secs(ctx.downloader.kill_grace_secs));

    ctx.store
        .append_log(job_id, "Running yt-dlp with explicit output template.");

    let mut sink = LogSink::new(ctx, *job_id);
    let outcome = fa_proc::run_streaming(spec, cancel, |line| sink.handle(line)).await?;

    match outcome {
        RunOutcome::Completed { .. } => {}
        RunOutcome::Cancelled => {
            cleanup_fragments(&placement.download_dir, &placement.download_stem);
            return Err(Error::Cancelled("Download stopped.".to_string()));
        }
        RunOutcome::Failed {
            exit_code,
            last_error_line,
        } => {
            ctx.store.append_log(
                job_id,
                format!("yt-dlp exited with code {}.", exit_code.unwrap_or(-1)),
            );
            cleanup_fragments(&placement.download_dir, &placement.download_stem);
            let summary = last_error_line.unwrap_or_else(|| "Download failed.".to_string());
            let summary: String = summary.chars().take(300).collect();
            return Err(Error::Process(format!("Download failed: {summary}")));
        }
    }

    let produced = files_with_stem(&placement.download_dir, &placement.download_stem)?;
    if produced.is_empty() {
        return Err(Error::Process(
            "Download completed but the output file could not be located.".to_string(),
        ));
    }
    Ok(produced)
}

fn record_format_metadata(
    ctx: &PipelineContext,
    job_id: &Id,
    extension: Option<&str>,
    format: Option<&ResolvedFormat>,
) {
    let mut entries = Vec::new();
    if let Some(ext) = extension {
        entries.push(format!("Format: {}", ext.to_uppercase()));
    }
    if let Some(format) = format {
        entries.push(format!("Format ID: {}", format.format_id));
        if format.resolution != "unknown" {
            entries.push(format!("Resolution: {}", format.resolution));
        }
        if format.video_codec != "unknown" {
            entries.push(format!("Video Codec: {}", format.video_codec));
        }
        if format.audio_codec != "unknown" {
            entries.push(format!("Audio Codec: {}", format.audio_codec));
        }
        if format.filesize != "unknown" {
            entries.push(format!("Filesize: {}", format.filesize));
        }
    }
    if !entries.is_empty() {
        ctx.store.set_format_metadata(job_id, entries);
    }
}

/// Rename the downloaded file to its canonical library name, stepping around
/// existing files with " (N)" suffixes.
fn place_file(
    ctx: &PipelineContext,
    job_id: &Id,
    placement: &Placement,
    target_path: &Path,
    extension: Option<&str>,
) -> Result<PathBuf> {
    let log = |message: String| ctx.store.append_log(job_id, message);

    let canonical_filename = match extension {
        Some(ext) => format!("{}.{ext}", placement.canonical_stem),
        None => placement.canonical_stem.clone(),
    };
    let mut canonical_path = placement.target_dir.join(&canonical_filename);
    if canonical_path.exists() && canonical_path != target_path {
        log(format!(
            "Canonical filename '{canonical_filename}' already exists. Searching for a free name."
        ));
        let (base, ext_part) = match canonical_filename.rsplit_once('.') {
            Some((base, ext)) => (base.to_string(), format!(".{ext}")),
            None => (canonical_filename.clone(), String::new()),
        };
        let mut suffix = 1u32;
        loop {
            let candidate_name = format!("{base} ({suffix}){ext_part}");
            let candidate = placement.target_dir.join(&candidate_name);
            if !candidate.exists() {
                log(format!("Selected canonical filename '{candidate_name}'."));
                canonical_path = candidate;
                break;
            }
            suffix += 1;
        }
    }

    if target_path != canonical_path {
        log(format!(
            "Renaming downloaded file to canonical name '{}'.",
            canonical_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        ));
        std::fs::rename(target_path, &canonical_path).map_err(|e| {
            Error::Placement(format!(
                "Failed to rename downloaded file to '{}': {e}",
                canonical_path.display()
            ))
        })?;
    } else {
        log("Download already matches canonical filename.".to_string());
    }
    Ok(canonical_path)
}

/// Format fragments like `name.f137.mp4` or `.temp` files that yt-dlp leaves
/// beside the merged output.
fn is_intermediate_file(path: &Path) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"\.f\d+\.\w+$").expect("valid fragment pattern"));
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".temp") || name.contains(".temp.") || pattern.is_match(name)
}

/// Files in `dir` whose stem matches, excluding partial download artifacts.
fn files_with_stem(dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        let matches_stem = name == stem
            || name
                .strip_prefix(stem)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false);
        if matches_stem {
            files.push(path);
        }
    }
    Ok(files)
}

fn pick_newest(paths: &[PathBuf]) -> Option<PathBuf> {
    paths
        .iter()
        .max_by_key(|p| {
            std::fs::metadata(p)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH)
        })
        .cloned()
}

/// Remove partial download artifacts (`.part`, `.ytdl`) for the given stem.
fn cleanup_fragments(dir: &Path, stem: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(stem) {
            continue;
        }
        if name.ends_with(".part") || name.ends_with(".ytdl") {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}
