//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Common test fixtures and mocks for all crates

/// Simple test helper function to demonstrate cross-crate testing
pub fn create_test_id() -> String {
    "test-id-123".to_string()
}

/// Helper for creating temporary directories in tests
pub fn temp_dir_path() -> std::path::PathBuf {
    std::env::temp_dir().join("fetcharr-test")
}

/// A per-test unique scratch directory name under the system temp dir.
/// Callers are responsible for creating and removing it.
pub fn scratch_dir(label: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("fetcharr-{label}-{nanos}"))
}
