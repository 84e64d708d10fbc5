//! Persistent package cache
//!
//! Content keyed by `(name, version)` under
//! `<cacheRoot>/.rexx-modules/<name>/<version>/index.js`. Entries are
//! immutable: the same `(name, version)` pair is assumed to always resolve
//! to identical bytes and is never re-fetched or invalidated.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LoaderError;

/// Directory created under the cache root.
pub const CACHE_DIR_NAME: &str = ".rexx-modules";

/// Project descriptor file that marks a cache-root directory.
pub const PROJECT_DESCRIPTOR: &str = "package.json";

const ENTRY_FILE_NAME: &str = "index.js";

/// A materialized cache entry. Immutable once created.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub module_name: String,
    pub version: String,
    pub disk_path: PathBuf,
}

/// On-disk store for remotely fetched packages.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Pick the cache root: the nearest ancestor of `start` containing a
    /// project descriptor, else the user's home directory, else `start`.
    pub fn discover(start: &Path) -> Self {
        for ancestor in start.ancestors() {
            if ancestor.join(PROJECT_DESCRIPTOR).is_file() {
                debug!("Cache root at project directory {}", ancestor.display());
                return Self::new(ancestor.to_path_buf());
            }
        }
        let root = dirs::home_dir().unwrap_or_else(|| start.to_path_buf());
        debug!("Cache root at {}", root.display());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for a `(name, version)` pair.
    pub fn entry_path(&self, name: &str, version: &str) -> PathBuf {
        self.root
            .join(CACHE_DIR_NAME)
            .join(name)
            .join(version)
            .join(ENTRY_FILE_NAME)
    }

    /// Return the cached source for `(name, version)`, or `None` on a miss.
    pub async fn load(&self, name: &str, version: &str) -> Result<Option<String>, LoaderError> {
        let path = self.entry_path(name, version);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            LoaderError::Cache(format!("Failed to read cached package {}: {e}", path.display()))
        })?;
        debug!("Cache hit for {}@{}", name, version);
        Ok(Some(contents))
    }

    /// Write a fetched package body verbatim, creating parent directories.
    pub async fn store(
        &self,
        name: &str,
        version: &str,
        body: &str,
    ) -> Result<CacheEntry, LoaderError> {
        let path = self.entry_path(name, version);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LoaderError::Cache(format!(
                    "Failed to create cache directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        tokio::fs::write(&path, body).await.map_err(|e| {
            LoaderError::Cache(format!("Failed to write cache file {}: {e}", path.display()))
        })?;
        debug!("Cached {}@{} at {}", name, version, path.display());
        Ok(CacheEntry {
            module_name: name.to_string(),
            version: version.to_string(),
            disk_path: path,
        })
    }
}
