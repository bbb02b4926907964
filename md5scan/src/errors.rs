//! This module defines the error types shared by the corpus builder, the configuration
//! layer and the scan engine.
//!
//! # Error Taxonomy
//!
//! Errors fall into two groups, and both are fatal for a run:
//!
//! 1. **Configuration errors** - a bad worker count, substring length or target digest.
//!    These are detected before any worker starts.
//! 2. **Resource errors** - a missing or unreadable corpus, a source file that cannot be
//!    read, a corpus that outgrows its capacity, or a thread pool that cannot be created.
//!
//! A search that finds nothing is *not* an error. It is reported through
//! [`ScanOutcome::NotFound`](crate::results::ScanOutcome::NotFound).
//!
//! ```rust,ignore
//! match scan(&corpus, &target, &config) {
//!     Ok(report) => // Found or NotFound,
//!     Err(ScanError::CorpusNotFound(path)) => // Build the corpus first,
//!     Err(e) => // Any other fatal error
//! }
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while building, loading or scanning a corpus
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Corpus not found: {0}")]
    CorpusNotFound(PathBuf),
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid target digest: {0}")]
    InvalidTarget(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Corpus full: adding {path} would exceed {capacity} bytes")]
    CorpusFull { path: PathBuf, capacity: usize },
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Manifest error: {0}")]
    ManifestError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    pub fn corpus_not_found(path: impl Into<PathBuf>) -> Self {
        Self::CorpusNotFound(path.into())
    }

    pub fn source_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SourceNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn corpus_full(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self::CorpusFull {
            path: path.into(),
            capacity,
        }
    }

    pub fn thread_pool(msg: impl Into<String>) -> Self {
        Self::ThreadPool(msg.into())
    }

    /// Maps an I/O error on `path` to the most specific variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::corpus_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// Same as [`ScanError::from_io`] for corpus source files
    pub fn from_source_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::source_not_found(path),
            _ => Self::from_io(path, err),
        }
    }

    /// Whether the error stems from user supplied settings rather than the environment
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::InvalidTarget(_))
    }
}
