//! ABOUTME: Playlist merging, one staged download per item plus ffmpeg concat
//! ABOUTME: Fail-fast staging with guaranteed cleanup of intermediate files

use fa_core::{Error, Result};
use fa_proc::{CommandSpec, LogLine, RunOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One playlist entry to stage, in input order
#[derive(Debug, Clone)]
pub struct MergeItem {
    pub url: String,
    pub title: Option<String>,
}

/// Staging directory that is removed on drop, whatever path the merge took.
/// The caller must move the merged file out before this goes out of scope.
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn create(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

/// Downloads each playlist item into a staging directory and concatenates
/// the results into one container file.
pub struct PlaylistMerger {
    yt_dlp_bin: String,
    ffmpeg_bin: String,
    format_selector: String,
    cookies_file: Option<String>,
    kill_grace: Duration,
}

impl PlaylistMerger {
    pub fn new(
        yt_dlp_bin: impl Into<String>,
        ffmpeg_bin: impl Into<String>,
        format_selector: impl Into<String>,
        cookies_file: Option<String>,
        kill_grace: Duration,
    ) -> Self {
        Self {
            yt_dlp_bin: yt_dlp_bin.into(),
            ffmpeg_bin: ffmpeg_bin.into(),
            format_selector: format_selector.into(),
            cookies_file,
            kill_grace,
        }
    }

    /// Stage every item into `staging` in order, then concatenate. Returns
    /// the merged file path inside `staging`. The first failed or cancelled
    /// item aborts the whole merge.
    pub async fn merge_all<F>(
        &self,
        items: &[MergeItem],
        staging: &Path,
        cancel: &CancellationToken,
        mut on_line: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(LogLine),
    {
        if items.is_empty() {
            return Err(Error::Validation(
                "Playlist merge requested but no playlist items were found.".to_string(),
            ));
        }

        info!(items = items.len(), staging = %staging.display(), "Staging playlist items");

        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled("Playlist staging stopped.".to_string()));
            }
            let template = staging.join(format!("{:05} - %(title)s.%(ext)s", index + 1));
            let mut spec = CommandSpec::new(&self.yt_dlp_bin);
            if let Some(cookies) = &self.cookies_file {
                spec = spec.args(["--cookies", cookies]);
            }
            let spec = spec
                .arg("--newline")
                .args(["-f", &self.format_selector])
                .arg("--no-playlist")
                .args(["-o", &template.to_string_lossy()])
                .arg(&item.url)
                .kill_after(self.kill_grace);

            debug!(index = index + 1, url = %item.url, "Staging playlist item");
            match fa_proc::run_streaming(spec, cancel, &mut on_line).await? {
                RunOutcome::Completed { .. } => {}
                RunOutcome::Cancelled => {
                    return Err(Error::Cancelled("Playlist staging stopped.".to_string()));
                }
                RunOutcome::Failed {
                    exit_code,
                    last_error_line,
                } => {
                    let detail = last_error_line
                        .unwrap_or_else(|| format!("downloader exited with {exit_code:?}"));
                    return Err(Error::Process(format!(
                        "Failed to download playlist item {} of {}: {}",
                        index + 1,
                        items.len(),
                        detail
                    )));
                }
            }
        }

        let staged = staged_files(staging)?;
        if staged.len() != items.len() {
            return Err(Error::Process(format!(
                "Playlist staging is incomplete: expected {} files, found {}.",
                items.len(),
                staged.len()
            )));
        }

        self.concat(&staged, staging, cancel, &mut on_line).await
    }

    async fn concat<F>(
        &self,
        staged: &[PathBuf],
        staging: &Path,
        cancel: &CancellationToken,
        on_line: &mut F,
    ) -> Result<PathBuf>
    where
        F: FnMut(LogLine),
    {
        let manifest = staging.join("concat.txt");
        std::fs::write(&manifest, concat_manifest(staged))?;

        let first_ext = staged
            .first()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let output = staging.join(format!("merged.{first_ext}"));

        info!(segments = staged.len(), output = %output.display(), "Merging playlist segments");
        let spec = CommandSpec::new(&self.ffmpeg_bin)
            .arg("-y")
            .args(["-f", "concat"])
            .args(["-safe", "0"])
            .args(["-i", &manifest.to_string_lossy()])
            .args(["-c", "copy"])
            .arg(&output.to_string_lossy())
            .kill_after(self.kill_grace);

        match fa_proc::run_streaming(spec, cancel, on_line).await? {
            RunOutcome::Completed { .. } if output.is_file() => {
                // Remove the inputs so only the merged file survives staging
                let _ = std::fs::remove_file(&manifest);
                for segment in staged {
                    let _ = std::fs::remove_file(segment);
                }
                Ok(output)
            }
            RunOutcome::Cancelled => Err(Error::Cancelled("Playlist merge stopped.".to_string())),
            _ => Err(Error::Process(
                "Failed to merge playlist videos into a single file.".to_string(),
            )),
        }
    }
}

/// Staged media files in name order, ignoring partial download artifacts.
fn staged_files(staging: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(staging)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".part") || name.ends_with(".ytdl") || name == "concat.txt" {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Build the ffmpeg concat demuxer manifest. Backslashes and single quotes
/// in paths must be escaped inside the quoted file directive.
fn concat_manifest(paths: &[PathBuf]) -> String {
    let mut manifest = String::new();
    for path in paths {
        let escaped = path
            .to_string_lossy()
            .replace('\\', "\\\\")
            .replace('\'', "\\'");
        manifest.push_str(&format!("file '{escaped}'\n"));
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use test_support::scratch_dir;

    #[test]
    fn test_concat_manifest_escapes_quotes() {
        let paths = vec![
            PathBuf::from("/tmp/It's Here.mp4"),
            PathBuf::from("/tmp/plain.mp4"),
        ];
        let manifest = concat_manifest(&paths);
        assert_eq!(
            manifest,
            "file '/tmp/It\\'s Here.mp4'\nfile '/tmp/plain.mp4'\n"
        );
    }

    #[test]
    fn test_staged_files_sorted_and_filtered() {
        let dir = scratch_dir("staged");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("00002 - b.mp4"), b"x").unwrap();
        fs::write(dir.join("00001 - a.mp4"), b"x").unwrap();
        fs::write(dir.join("00003 - c.mp4.part"), b"x").unwrap();
        fs::write(dir.join("concat.txt"), b"x").unwrap();

        let staged = staged_files(&dir).unwrap();
        let names: Vec<String> = staged
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["00001 - a.mp4", "00002 - b.mp4"]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_staging_dir_removed_on_drop() {
        let path = scratch_dir("staging-drop");
        {
            let staging = StagingDir::create(path.clone()).unwrap();
            fs::write(staging.path().join("leftover.mp4"), b"x").unwrap();
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_merge_all_rejects_empty_items() {
        let dir = scratch_dir("merge-empty");
        fs::create_dir_all(&dir).unwrap();
        let merger = PlaylistMerger::new(
            "yt-dlp",
            "ffmpeg",
            "best",
            None,
            Duration::from_secs(1),
        );
        let cancel = CancellationToken::new();
        let err = merger
            .merge_all(&[], &dir, &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_merge_all_fails_fast_on_bad_downloader() {
        // "false" exits non-zero immediately, so the first item aborts the merge
        let dir = scratch_dir("merge-failfast");
        fs::create_dir_all(&dir).unwrap();
        let merger = PlaylistMerger::new(
            "false",
            "ffmpeg",
            "best",
            None,
            Duration::from_secs(1),
        );
        let items = vec![
            MergeItem {
                url: "https://example.com/a".to_string(),
                title: None,
            },
            MergeItem {
                url: "https://example.com/b".to_string(),
                title: None,
            },
        ];
        let cancel = CancellationToken::new();
        let err = merger
            .merge_all(&items, &dir, &cancel, |_| {})
            .await
            .unwrap_err();
        match err {
            Error::Process(message) => assert!(message.contains("item 1 of 2"), "{message}"),
            other => panic!("expected process error, got {other:?}"),
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_merge_all_pre_cancelled() {
        let dir = scratch_dir("merge-cancelled");
        fs::create_dir_all(&dir).unwrap();
        let merger = PlaylistMerger::new(
            "yt-dlp",
            "ffmpeg",
            "best",
            None,
            Duration::from_secs(1),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let items = vec![MergeItem {
            url: "https://example.com/a".to_string(),
            title: None,
        }];
        let err = merger
            .merge_all(&items, &dir, &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        fs::remove_dir_all(&dir).unwrap();
    }
}
