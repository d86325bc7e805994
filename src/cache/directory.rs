//! Filesystem-backed dependency cache

use crate::cache::{CacheError, DependencyCache};
use crate::core::CacheLookup;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Cache storing one directory tree per key
///
/// Layout: `<root>/<sanitized key>/<workspace-relative path>`.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache under the platform cache directory
    pub fn with_default_path() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("ci-runner"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the entry for `key`
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

/// Map a cache key onto a single safe path segment
pub fn sanitize_key(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Never produce "." or ".."
    if sanitized.chars().all(|c| c == '.') {
        sanitized.replace('.', "_")
    } else {
        sanitized
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn walk_err(root: &Path) -> impl FnOnce(walkdir::Error) -> CacheError + '_ {
    move |e| CacheError::Io {
        path: e.path().unwrap_or(root).to_path_buf(),
        source: e.into(),
    }
}

/// Whether anything (including a dangling symlink) exists at `path`
fn is_present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

/// Copy a file or directory tree from `src` to `dst`, overwriting files
///
/// Symlinks below `src` are recreated as links, never followed.
fn copy_tree(src: &Path, dst: &Path) -> Result<u64, CacheError> {
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(walk_err(src))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| CacheError::Internal(format!("walked outside {}: {}", src.display(), e)))?;
        let target = if relative.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_err(&target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        if file_type.is_symlink() {
            if is_present(&target) {
                fs::remove_file(&target).map_err(io_err(&target))?;
            }
            copy_symlink(entry.path(), &target).map_err(io_err(entry.path()))?;
        } else {
            fs::copy(entry.path(), &target).map_err(io_err(entry.path()))?;
        }
        copied += 1;
    }

    Ok(copied)
}

fn restore_blocking(
    entry: &Path,
    paths: &[PathBuf],
    workspace: &Path,
) -> Result<CacheLookup, CacheError> {
    if !entry.is_dir() {
        return Ok(CacheLookup::Miss);
    }

    let mut copied = 0;
    for path in paths {
        let cached = entry.join(path);
        if is_present(&cached) {
            copied += copy_tree(&cached, &workspace.join(path))?;
        } else {
            debug!("Cache entry has no {}", path.display());
        }
    }

    info!("Restored {} files from cache {}", copied, entry.display());
    Ok(CacheLookup::Hit)
}

fn save_blocking(
    root: &Path,
    entry: &Path,
    paths: &[PathBuf],
    workspace: &Path,
) -> Result<(), CacheError> {
    fs::create_dir_all(root).map_err(io_err(root))?;

    // Removed on drop, so a failed save leaves nothing behind
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(root)
        .map_err(io_err(root))?;

    let mut copied = 0;
    for path in paths {
        let source = workspace.join(path);
        if is_present(&source) {
            copied += copy_tree(&source, &staging.path().join(path))?;
        } else {
            debug!("Nothing to cache at {}", source.display());
        }
    }

    if is_present(entry) {
        fs::remove_dir_all(entry).map_err(io_err(entry))?;
    }
    fs::rename(staging.path(), entry).map_err(io_err(entry))?;
    // The staged tree now lives at `entry`
    let _ = staging.keep();

    info!("Saved {} files to cache {}", copied, entry.display());
    Ok(())
}

#[async_trait]
impl DependencyCache for DirectoryCache {
    async fn restore(
        &self,
        key: &str,
        paths: &[PathBuf],
        workspace: &Path,
    ) -> Result<CacheLookup, CacheError> {
        let entry = self.entry_dir(key);
        let paths = paths.to_vec();
        let workspace = workspace.to_path_buf();

        tokio::task::spawn_blocking(move || restore_blocking(&entry, &paths, &workspace))
            .await
            .map_err(|e| CacheError::Internal(format!("cache restore task failed: {}", e)))?
    }

    async fn save(
        &self,
        key: &str,
        paths: &[PathBuf],
        workspace: &Path,
    ) -> Result<(), CacheError> {
        let root = self.root.clone();
        let entry = self.entry_dir(key);
        let paths = paths.to_vec();
        let workspace = workspace.to_path_buf();

        tokio::task::spawn_blocking(move || save_blocking(&root, &entry, &paths, &workspace))
            .await
            .map_err(|e| CacheError::Internal(format!("cache save task failed: {}", e)))?
    }
}
