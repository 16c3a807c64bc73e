//! ABOUTME: Collision-avoidance for filename stems and folders
//! ABOUTME: Appends " (N)" suffixes until a free name is found

use std::io;
use std::path::{Path, PathBuf};

/// Find a free name by appending " (N)" suffixes. `taken` reports whether a
/// candidate is already occupied; the base name itself is tried first.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut suffix = 1u32;
    loop {
        let candidate = format!("{base} ({suffix})");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Check whether any file in `dir` uses `stem` as its filename stem, i.e.
/// is named `stem` exactly or `stem.<ext>`. A missing directory counts as
/// having no occupants.
pub fn stem_taken_in_dir(dir: &Path, stem: &str) -> io::Result<bool> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == stem {
            return Ok(true);
        }
        if let Some(rest) = name.strip_prefix(stem) {
            if rest.starts_with('.') {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Pick a filename stem in `dir` that does not collide with existing files,
/// regardless of extension.
pub fn unique_stem_in_dir(dir: &Path, base: &str) -> io::Result<String> {
    if !stem_taken_in_dir(dir, base)? {
        return Ok(base.to_string());
    }
    let mut suffix = 1u32;
    loop {
        let candidate = format!("{base} ({suffix})");
        if !stem_taken_in_dir(dir, &candidate)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// Resolve a folder path under `base_dir`. An existing directory with the
/// requested name is reused; only a plain file squatting on the name forces
/// a " (N)" suffix.
pub fn unique_folder_in_dir(base_dir: &Path, name: &str) -> PathBuf {
    let direct = base_dir.join(name);
    if !direct.is_file() {
        return direct;
    }
    let mut suffix = 1u32;
    loop {
        let candidate = base_dir.join(format!("{name} ({suffix})"));
        if !candidate.exists() || candidate.is_dir() {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use test_support::scratch_dir;

    #[test]
    fn test_unique_name_prefers_base() {
        assert_eq!(unique_name("Movie", |_| false), "Movie");
    }

    #[test]
    fn test_unique_name_counts_upward() {
        let taken = |name: &str| matches!(name, "Movie" | "Movie (1)" | "Movie (2)");
        assert_eq!(unique_name("Movie", taken), "Movie (3)");
    }

    #[test]
    fn test_stem_taken_matches_any_extension() {
        let dir = scratch_dir("stems");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Movie (2020).mkv"), b"x").unwrap();

        assert!(stem_taken_in_dir(&dir, "Movie (2020)").unwrap());
        assert!(!stem_taken_in_dir(&dir, "Movie").unwrap());
        assert!(!stem_taken_in_dir(&dir, "Other Movie").unwrap());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stem_taken_missing_dir_is_free() {
        let dir = scratch_dir("missing");
        assert!(!stem_taken_in_dir(&dir, "Movie").unwrap());
    }

    #[test]
    fn test_unique_stem_in_dir_suffixes_past_collisions() {
        let dir = scratch_dir("unique-stem");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Clip.mp4"), b"x").unwrap();
        fs::write(dir.join("Clip (1).webm"), b"x").unwrap();

        assert_eq!(unique_stem_in_dir(&dir, "Clip").unwrap(), "Clip (2)");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unique_folder_reuses_existing_directory() {
        let dir = scratch_dir("folders");
        fs::create_dir_all(dir.join("Show")).unwrap();

        assert_eq!(unique_folder_in_dir(&dir, "Show"), dir.join("Show"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unique_folder_steps_around_plain_file() {
        let dir = scratch_dir("folder-collide");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Show"), b"not a dir").unwrap();

        assert_eq!(unique_folder_in_dir(&dir, "Show"), dir.join("Show (1)"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
