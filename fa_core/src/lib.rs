//! ABOUTME: Core types, errors, IDs, and tracing utilities
//! ABOUTME: Foundation crate used by all other fetcharr components

pub mod error;
pub mod id;
pub mod telemetry;

pub use error::{Error, Result};
pub use id::Id;
