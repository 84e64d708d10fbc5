//! Loader configuration
//!
//! Defaults are suitable for production use; every field can be overridden
//! from a TOML or JSON config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

/// Well-known URL of the publisher registry document.
pub const DEFAULT_PUBLISHER_REGISTRY_URL: &str =
    "https://rexxjs.org/.registry/publishers.txt";

/// Public CDN mirror for npm-published library packages.
pub const DEFAULT_MIRROR_BASE_URL: &str = "https://unpkg.com";

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Publisher registry document URL (two-tier registry, first tier).
    #[serde(default = "default_publisher_registry_url")]
    pub publisher_registry_url: String,

    /// CDN mirror base URL; packages are fetched at `<base>/<name>@<version>`.
    #[serde(default = "default_mirror_base_url")]
    pub mirror_base_url: String,

    /// Explicit cache root. When unset, the nearest ancestor directory with
    /// a project descriptor is used, falling back to the home directory.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,

    /// Maximum redirect hops followed when fetching from the mirror.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_publisher_registry_url() -> String {
    DEFAULT_PUBLISHER_REGISTRY_URL.to_string()
}

fn default_mirror_base_url() -> String {
    DEFAULT_MIRROR_BASE_URL.to_string()
}

fn default_max_redirects() -> usize {
    5
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            publisher_registry_url: default_publisher_registry_url(),
            mirror_base_url: default_mirror_base_url(),
            cache_root: None,
            max_redirects: default_max_redirects(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, LoaderError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::Cache(format!("Failed to read config file: {e}")))?;
        toml::from_str(&contents)
            .map_err(|e| LoaderError::Resolution(format!("Failed to parse TOML config: {e}")))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, LoaderError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::Cache(format!("Failed to read config file: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| LoaderError::Resolution(format!("Failed to parse JSON config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.publisher_registry_url, DEFAULT_PUBLISHER_REGISTRY_URL);
        assert_eq!(config.mirror_base_url, DEFAULT_MIRROR_BASE_URL);
        assert_eq!(config.max_redirects, 5);
        assert!(config.cache_root.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: LoaderConfig =
            toml::from_str("mirror_base_url = \"https://mirror.example\"").unwrap();
        assert_eq!(config.mirror_base_url, "https://mirror.example");
        assert_eq!(config.publisher_registry_url, DEFAULT_PUBLISHER_REGISTRY_URL);
    }
}
