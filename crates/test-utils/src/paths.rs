//! Path utilities for test datasets.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the current crate's manifest directory
/// until we find the workspace Cargo.toml.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Creates a temporary directory and a dataset path inside it that does
/// not exist yet.
///
/// Keep the `TempDir` alive for as long as the dataset is used.
pub fn temp_dataset_path(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::Builder::new()
        .prefix("bag_test_")
        .tempdir()
        .expect("Failed to create temporary test directory");
    let path = dir.path().join(format!("{name}.bag"));
    (dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_temp_test_dir() {
        let dir = temp_test_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_temp_dataset_path_is_fresh() {
        let (dir, path) = temp_dataset_path("survey");
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists());
        assert!(path.to_string_lossy().ends_with("survey.bag"));
    }
}
