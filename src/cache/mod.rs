//! Dependency cache shared between pipeline runs

pub mod directory;

use crate::core::CacheLookup;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use directory::DirectoryCache;

/// Error types for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for cache backends
///
/// Paths are relative to `workspace`. A missing entry is `Ok(Miss)`, not
/// an error.
#[async_trait]
pub trait DependencyCache: Send + Sync {
    /// Restore a cached entry into the workspace
    async fn restore(
        &self,
        key: &str,
        paths: &[PathBuf],
        workspace: &Path,
    ) -> Result<CacheLookup, CacheError>;

    /// Store the workspace paths under `key`, replacing any previous entry
    async fn save(&self, key: &str, paths: &[PathBuf], workspace: &Path) -> Result<(), CacheError>;
}

#[async_trait]
impl<T: DependencyCache + ?Sized> DependencyCache for std::sync::Arc<T> {
    async fn restore(
        &self,
        key: &str,
        paths: &[PathBuf],
        workspace: &Path,
    ) -> Result<CacheLookup, CacheError> {
        (**self).restore(key, paths, workspace).await
    }

    async fn save(&self, key: &str, paths: &[PathBuf], workspace: &Path) -> Result<(), CacheError> {
        (**self).save(key, paths, workspace).await
    }
}

/// Cache that never holds anything (for `--no-cache` runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl DependencyCache for NoCache {
    async fn restore(
        &self,
        _key: &str,
        _paths: &[PathBuf],
        _workspace: &Path,
    ) -> Result<CacheLookup, CacheError> {
        Ok(CacheLookup::Miss)
    }

    async fn save(
        &self,
        _key: &str,
        _paths: &[PathBuf],
        _workspace: &Path,
    ) -> Result<(), CacheError> {
        Ok(())
    }
}
