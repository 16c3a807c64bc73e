//! ABOUTME: Extra content types recognized by the media library layout
//! ABOUTME: Maps user-provided type strings onto canonical folders and labels

use serde::{Deserialize, Serialize};

/// Category of extra content stored alongside a movie's main file.
///
/// The folder names match what library scanners expect for movie extras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraType {
    Trailer,
    BehindTheScenes,
    Deleted,
    Featurette,
    Interview,
    Scene,
    Short,
    Other,
}

impl ExtraType {
    /// Parse a user-provided type string, folding plurals and common aliases.
    /// Non-letter characters are ignored, so "behind-the-scenes" and
    /// "Behind The Scenes" both resolve.
    pub fn parse(raw: &str) -> Option<Self> {
        let token: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_lowercase();
        let extra_type = match token.as_str() {
            "trailer" | "trailers" => Self::Trailer,
            "behindthescenes"
            | "behindthescene"
            | "behindthescenesclip"
            | "behindthescenesfeature"
            | "behindthescenesfeaturette" => Self::BehindTheScenes,
            "deleted" | "deletedscene" | "deletedscenes" => Self::Deleted,
            "featurette" | "featurettes" => Self::Featurette,
            "interview" | "interviews" => Self::Interview,
            "scene" | "scenes" => Self::Scene,
            "short" | "shorts" => Self::Short,
            "other" | "extras" => Self::Other,
            _ => return None,
        };
        Some(extra_type)
    }

    /// Subfolder under the movie directory where this kind of extra lives.
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Trailer => "Trailers",
            Self::BehindTheScenes => "Behind The Scenes",
            Self::Deleted => "Deleted Scenes",
            Self::Featurette => "Featurettes",
            Self::Interview => "Interviews",
            Self::Scene => "Scenes",
            Self::Short => "Shorts",
            Self::Other => "Other",
        }
    }

    /// Human-readable singular label, used as the default filename suffix.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trailer => "Trailer",
            Self::BehindTheScenes => "Behind the Scenes",
            Self::Deleted => "Deleted Scene",
            Self::Featurette => "Featurette",
            Self::Interview => "Interview",
            Self::Scene => "Scene",
            Self::Short => "Short",
            Self::Other => "Other",
        }
    }

    /// Canonical lowercase key, matching the serde representation.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Trailer => "trailer",
            Self::BehindTheScenes => "behindthescenes",
            Self::Deleted => "deleted",
            Self::Featurette => "featurette",
            Self::Interview => "interview",
            Self::Scene => "scene",
            Self::Short => "short",
            Self::Other => "other",
        }
    }
}

impl Default for ExtraType {
    fn default() -> Self {
        Self::Trailer
    }
}

impl std::fmt::Display for ExtraType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
