//! Run configuration for a plan+install pass.

use crate::paths;
use crate::registry::{DEFAULT_SOURCE, SOURCE_ENV};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration shared by the planner and the installer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Registry service index or base URL.
    pub source: String,

    /// Root of the destination module tree.
    pub destination: PathBuf,

    /// Directory for downloaded archives.
    pub cache_dir: PathBuf,

    /// Directories scanned for already-installed modules.
    pub search_paths: Vec<PathBuf>,

    /// Allow pre-release versions to satisfy constraints.
    pub prerelease: bool,

    /// Re-resolve modules even when a local install satisfies the spec.
    pub update: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            source: std::env::var(SOURCE_ENV).unwrap_or_else(|_| DEFAULT_SOURCE.to_string()),
            destination: paths::default_destination(),
            cache_dir: paths::cache_dir(),
            search_paths: paths::search_paths_from_env(),
            prerelease: false,
            update: false,
        }
    }
}

impl InstallConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_destination(mut self, destination: PathBuf) -> Self {
        self.destination = destination;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    #[must_use]
    pub fn with_search_paths(mut self, search_paths: Vec<PathBuf>) -> Self {
        self.search_paths = search_paths;
        self
    }

    #[must_use]
    pub fn with_prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = prerelease;
        self
    }

    #[must_use]
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }
}
