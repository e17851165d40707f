//! FileSystem trait for abstracting file I/O.
//!
//! Defined in kindred-core so services can write media files and validate
//! asset paths without depending on any specific filesystem implementation.
//! The `LocalFileSystem` adapter lives in kindred-infra.

use std::path::Path;

/// Abstraction over filesystem operations.
///
/// This trait allows the service layer to read/write files without coupling
/// to the real filesystem, enabling easy testing with in-memory implementations.
pub trait FileSystem: Send + Sync {
    /// Write bytes to a file, creating parent directories as needed.
    fn write_bytes(
        &self,
        path: &Path,
        content: &[u8],
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;

    /// Read a file's content as bytes.
    fn read_bytes(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, std::io::Error>> + Send;

    /// Create a directory and all parent directories.
    fn create_dir_all(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;

    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = bool> + Send;

    /// Size of a regular file in bytes.
    fn file_size(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<u64, std::io::Error>> + Send;

    fn remove_file(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;
}
