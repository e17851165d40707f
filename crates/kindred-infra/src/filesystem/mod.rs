//! Filesystem adapter and data directory layout for Kindred.
//!
//! Implements the `FileSystem` trait from `kindred-core` on `tokio::fs`.
//! Everything the service writes lives under one data directory:
//!
//! ```text
//! ~/.kindred/
//!   config.toml
//!   kindred.db
//!   vectors/
//!   media/images/
//!   media/voice/
//! ```

use std::path::{Path, PathBuf};

use kindred_core::service::fs::FileSystem;

/// Local filesystem implementation of the `FileSystem` trait.
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("kindred.db")
    }

    pub fn vector_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("vectors")
    }

    /// Root of generated media. Images and voice notes go in subdirectories.
    pub fn media_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("media")
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for LocalFileSystem {
    async fn write_bytes(&self, path: &Path, content: &[u8]) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        tokio::fs::read(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn file_size(&self, path: &Path) -> Result<u64, std::io::Error> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), std::io::Error> {
        tokio::fs::remove_file(path).await
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `KINDRED_DATA_DIR` environment variable
/// 2. `~/.kindred`
/// 3. `./.kindred` when there is no home directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("KINDRED_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".kindred");
    }

    PathBuf::from(".kindred")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let file_path = dir.path().join("media").join("images").join("a.png");

        fs.write_bytes(&file_path, b"\x89PNG").await.unwrap();
        assert_eq!(fs.read_bytes(&file_path).await.unwrap(), b"\x89PNG");
        assert_eq!(fs.file_size(&file_path).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_exists_and_remove() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let file_path = dir.path().join("voice.wav");

        assert!(!fs.exists(&file_path).await);
        fs.write_bytes(&file_path, b"RIFF").await.unwrap();
        assert!(fs.exists(&file_path).await);

        fs.remove_file(&file_path).await.unwrap();
        assert!(!fs.exists(&file_path).await);
    }

    #[tokio::test]
    async fn test_file_size_missing_is_error() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        assert!(fs.file_size(&dir.path().join("nope")).await.is_err());
    }

    #[test]
    fn test_layout_paths() {
        let data_dir = PathBuf::from("/home/user/.kindred");
        assert_eq!(
            LocalFileSystem::db_path(&data_dir),
            PathBuf::from("/home/user/.kindred/kindred.db")
        );
        assert_eq!(
            LocalFileSystem::media_dir(&data_dir),
            PathBuf::from("/home/user/.kindred/media")
        );
        assert_eq!(
            LocalFileSystem::vector_dir(&data_dir),
            PathBuf::from("/home/user/.kindred/vectors")
        );
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var("KINDRED_DATA_DIR", "/tmp/test-kindred");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-kindred"));
        unsafe {
            std::env::remove_var("KINDRED_DATA_DIR");
        }
    }
}
