//! Filesystem locations and search-path handling.

use std::path::{Path, PathBuf};

/// Environment variable holding the module search path
/// (`PATH`-separator-delimited list of directories).
pub const MODULE_PATH_ENV: &str = "MODGET_MODULE_PATH";

/// The archive cache directory.
///
/// Platform cache root when available, `.modget-cache` in the working
/// directory otherwise.
#[must_use]
pub fn cache_dir() -> PathBuf {
    dirs_next::cache_dir().map_or_else(
        || PathBuf::from(".modget-cache"),
        |p| p.join("modget").join("archives"),
    )
}

/// The default destination module tree.
#[must_use]
pub fn default_destination() -> PathBuf {
    dirs_next::data_dir().map_or_else(
        || PathBuf::from("Modules"),
        |p| p.join("modget").join("Modules"),
    )
}

/// Read the module search path from the environment.
///
/// Empty entries are skipped.
#[must_use]
pub fn search_paths_from_env() -> Vec<PathBuf> {
    match std::env::var_os(MODULE_PATH_ENV) {
        Some(raw) => std::env::split_paths(&raw)
            .filter(|p| !p.as_os_str().is_empty())
            .collect(),
        None => Vec::new(),
    }
}

/// The manifest path for a module version directory.
#[must_use]
pub fn manifest_path(version_dir: &Path, name: &str) -> PathBuf {
    version_dir.join(format!("{name}.psd1"))
}
