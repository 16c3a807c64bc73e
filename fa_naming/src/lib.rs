//! ABOUTME: Library naming rules for movie files, extras, and standalone folders
//! ABOUTME: Pure path/stem computation with collision-avoidance helpers

pub mod collision;
pub mod extras;
pub mod sanitize;

pub use collision::{unique_folder_in_dir, unique_name, unique_stem_in_dir};
pub use extras::ExtraType;
pub use sanitize::{movie_stem, sanitize_filename};
