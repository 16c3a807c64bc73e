//! ABOUTME: Job data model and presentation metadata
//! ABOUTME: Request shapes, the status machine, and display descriptors

use chrono::{DateTime, Utc};
use fa_core::Id;
use fa_media::MovieSelector;
use fa_naming::ExtraType;
use serde::{Deserialize, Serialize};

/// Lifecycle of a job. Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Whether a playlist URL downloads one video or merges every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistMode {
    #[default]
    Single,
    Merge,
}

/// Naming source for standalone downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandaloneNameMode {
    /// Use the title reported by the video platform
    #[default]
    Youtube,
    /// Use the caller-provided name
    Custom,
}

/// Extra-content marker for a movie download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraSpec {
    pub extra_type: ExtraType,
    /// Display name overriding the type label
    #[serde(default)]
    pub name: Option<String>,
}

/// Where the downloaded file ends up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobTarget {
    /// A movie already in (or resolvable through) the media catalog
    Movie {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tmdb_id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extra: Option<ExtraSpec>,
    },
    /// A download placed in its own folder outside the catalog
    Standalone {
        #[serde(default)]
        name_mode: StandaloneNameMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_name: Option<String>,
    },
}

impl JobTarget {
    pub fn is_standalone(&self) -> bool {
        matches!(self, Self::Standalone { .. })
    }

    pub fn extra(&self) -> Option<&ExtraSpec> {
        match self {
            Self::Movie { extra, .. } => extra.as_ref(),
            Self::Standalone { .. } => None,
        }
    }

    /// Movie resolution criteria, when the target references the catalog
    pub fn movie_selector(&self) -> Option<MovieSelector> {
        match self {
            Self::Movie {
                id,
                tmdb_id,
                title,
                year,
                ..
            } => Some(MovieSelector {
                id: *id,
                tmdb_id: *tmdb_id,
                title: title.clone(),
                year: *year,
            }),
            Self::Standalone { .. } => None,
        }
    }
}

/// Validated input for one download job, immutable after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub url: String,
    pub target: JobTarget,
    #[serde(default)]
    pub playlist_mode: PlaylistMode,
}

/// A download job and its observable history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Id,
    pub status: JobStatus,
    /// Percentage 0-100, monotonically non-decreasing
    pub progress: f32,
    /// Headline shown in job listings
    pub label: String,
    /// Secondary line, empty when there is nothing to add
    pub subtitle: String,
    /// Short facts about the job (extra placement, merge mode, formats)
    pub metadata: Vec<String>,
    /// Terminal summary, set on failure or cancellation
    pub message: String,
    pub logs: Vec<String>,
    pub request: JobRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Presentation strings derived from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptors {
    pub label: String,
    pub subtitle: String,
    pub metadata: Vec<String>,
}

/// Build the label, subtitle, and metadata lines shown for a job.
pub fn describe(request: &JobRequest) -> JobDescriptors {
    let standalone = request.target.is_standalone();
    let mut movie_label = match &request.target {
        JobTarget::Movie { title, .. } => title.clone().unwrap_or_default(),
        JobTarget::Standalone {
            name_mode,
            custom_name,
        } => match (name_mode, custom_name) {
            (StandaloneNameMode::Custom, Some(name)) if !name.trim().is_empty() => {
                name.trim().to_string()
            }
            _ => String::new(),
        },
    };
    movie_label = movie_label.trim().to_string();
    if movie_label.is_empty() {
        movie_label = if standalone {
            "Standalone Download".to_string()
        } else {
            "Selected Movie".to_string()
        };
    }

    let merge = request.playlist_mode == PlaylistMode::Merge;
    let (label, subtitle) = match request.target.extra() {
        Some(extra) => {
            let extra_label = extra
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| extra.extra_type.label().to_string());
            (
                format!("{movie_label} – {extra_label}"),
                format!("Extra • {extra_label}"),
            )
        }
        None => (movie_label, String::new()),
    };

    let mut metadata = Vec::new();
    if request.target.extra().is_some() {
        metadata.push("Stored as extra content".to_string());
    }
    if merge {
        metadata.push("Playlist merged into single file".to_string());
    }
    if standalone {
        metadata.push("Standalone download (outside Radarr)".to_string());
    }

    JobDescriptors {
        label,
        subtitle,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_request(extra: Option<ExtraSpec>) -> JobRequest {
        JobRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            target: JobTarget::Movie {
                id: Some(7),
                tmdb_id: None,
                title: Some("Stalker".to_string()),
                year: Some(1979),
                extra,
            },
            playlist_mode: PlaylistMode::Single,
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    #[test]
    fn test_describe_plain_movie() {
        let descriptors = describe(&movie_request(None));
        assert_eq!(descriptors.label, "Stalker");
        assert_eq!(descriptors.subtitle, "");
        assert!(descriptors.metadata.is_empty());
    }

    #[test]
    fn test_describe_extra_uses_type_label_when_unnamed() {
        let descriptors = describe(&movie_request(Some(ExtraSpec {
            extra_type: ExtraType::Trailer,
            name: None,
        })));
        assert_eq!(descriptors.label, "Stalker – Trailer");
        assert_eq!(descriptors.subtitle, "Extra • Trailer");
        assert_eq!(descriptors.metadata, vec!["Stored as extra content"]);
    }

    #[test]
    fn test_describe_standalone_custom_name() {
        let request = JobRequest {
            url: "https://youtu.be/x".to_string(),
            target: JobTarget::Standalone {
                name_mode: StandaloneNameMode::Custom,
                custom_name: Some("  Concert 2024  ".to_string()),
            },
            playlist_mode: PlaylistMode::Merge,
        };
        let descriptors = describe(&request);
        assert_eq!(descriptors.label, "Concert 2024");
        assert_eq!(
            descriptors.metadata,
            vec![
                "Playlist merged into single file",
                "Standalone download (outside Radarr)"
            ]
        );
    }

    #[test]
    fn test_describe_standalone_fallback_label() {
        let request = JobRequest {
            url: "https://youtu.be/x".to_string(),
            target: JobTarget::Standalone {
                name_mode: StandaloneNameMode::Youtube,
                custom_name: None,
            },
            playlist_mode: PlaylistMode::Single,
        };
        assert_eq!(describe(&request).label, "Standalone Download");
    }
}
