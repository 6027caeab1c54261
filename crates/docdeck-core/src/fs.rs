//! Filesystem collaborator.
//!
//! ## Learning: `impl Future` in Traits
//!
//! Trait methods can return `impl Future<Output = T> + Send`. Implementors
//! may then write a plain `async fn`, and generic callers know the future
//! can be moved into a spawned task.

use std::future::Future;
use std::io;

/// Failures reported by the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

impl FsError {
    fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io {
                path: path.to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Reads and writes whole files.
pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &str) -> impl Future<Output = Result<String, FsError>> + Send;

    fn write_file(
        &self,
        path: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), FsError>> + Send;
}

/// The local disk, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }
}
