//! Local module scanner.
//!
//! Short-circuits resolution when a satisfying module is already installed
//! somewhere on the module search path. Version directories are parsed as
//! classical versions, so pre-release directories never match.

use crate::error::Error;
use crate::paths::manifest_path;
use crate::spec::ModuleSpec;
use crate::version::{folder_name, ClassicalVersion};
use semver::Version;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Find an installed module satisfying `spec`.
///
/// Returns the manifest path of the best (highest) satisfying version, or
/// `None` when nothing on the search path qualifies. A version directory
/// without its manifest is reported as [`Error::CorruptLocalModule`].
pub fn find_local(spec: &ModuleSpec, search_paths: &[PathBuf]) -> Result<Option<PathBuf>, Error> {
    for root in search_paths {
        let module_dir = root.join(spec.name());

        if let Some(required) = spec.required_version() {
            let version_dir = module_dir.join(folder_name(required));
            let manifest = manifest_path(&version_dir, spec.name());
            if manifest.is_file() {
                return Ok(Some(manifest));
            }
            continue;
        }

        if !module_dir.is_dir() {
            continue;
        }

        if let Some(hit) = scan_version_dirs(&module_dir, spec)? {
            return Ok(Some(hit));
        }
    }

    Ok(None)
}

/// Enumerate `{module_dir}/*` version directories and pick the highest one
/// the spec matches.
fn scan_version_dirs(module_dir: &Path, spec: &ModuleSpec) -> Result<Option<PathBuf>, Error> {
    let mut best: Option<(Version, PathBuf)> = None;

    let entries = match std::fs::read_dir(module_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %module_dir.display(), error = %e, "cannot read module directory");
            return Ok(None);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let dir_name = entry.file_name();
        let dir_name = dir_name.to_string_lossy();

        let Ok(classical) = ClassicalVersion::from_str(&dir_name) else {
            tracing::warn!(
                module = spec.name(),
                dir = %dir_name,
                "skipping version directory with unparseable name"
            );
            continue;
        };

        let version = classical.to_semver();
        if !spec.matches(&version) {
            continue;
        }

        let replace = match &best {
            Some((current, _)) => version.cmp_precedence(current) == std::cmp::Ordering::Greater,
            None => true,
        };
        if replace {
            best = Some((version, path));
        }
    }

    match best {
        Some((_, version_dir)) => {
            let manifest = manifest_path(&version_dir, spec.name());
            if !manifest.is_file() {
                return Err(Error::CorruptLocalModule { path: version_dir });
            }
            Ok(Some(manifest))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn install_fake_module(root: &Path, name: &str, version: &str, with_manifest: bool) {
        let dir = root.join(name).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        if with_manifest {
            std::fs::write(dir.join(format!("{name}.psd1")), "@{}").unwrap();
        }
    }

    #[test]
    fn test_required_spec_probes_exact_directory() {
        let dir = tempdir().unwrap();
        install_fake_module(dir.path(), "Pester", "5.3.0", true);

        let spec = ModuleSpec::parse("Pester@5.3.0").unwrap();
        let hit = find_local(&spec, &[dir.path().to_path_buf()]).unwrap();
        assert!(hit.is_some());
        assert!(hit.unwrap().ends_with("Pester/5.3.0/Pester.psd1"));
    }

    #[test]
    fn test_required_miss_returns_none() {
        let dir = tempdir().unwrap();
        install_fake_module(dir.path(), "Pester", "5.3.0", true);

        let spec = ModuleSpec::parse("Pester@5.4.0").unwrap();
        assert!(find_local(&spec, &[dir.path().to_path_buf()]).unwrap().is_none());
    }

    #[test]
    fn test_range_spec_picks_highest_matching() {
        let dir = tempdir().unwrap();
        install_fake_module(dir.path(), "Pester", "4.0.0", true);
        install_fake_module(dir.path(), "Pester", "5.3.0", true);
        install_fake_module(dir.path(), "Pester", "6.0.0", true);

        let spec = ModuleSpec::bounded(
            "Pester",
            Version::new(4, 0, 0),
            Version::new(5, 99, 0),
        )
        .unwrap();
        let hit = find_local(&spec, &[dir.path().to_path_buf()]).unwrap().unwrap();
        assert!(hit.ends_with("Pester/5.3.0/Pester.psd1"));
    }

    #[test]
    fn test_prerelease_directories_are_skipped() {
        let dir = tempdir().unwrap();
        install_fake_module(dir.path(), "Pester", "6.0.0-beta1", true);
        install_fake_module(dir.path(), "Pester", "5.3.0", true);

        let spec = ModuleSpec::any("Pester");
        let hit = find_local(&spec, &[dir.path().to_path_buf()]).unwrap().unwrap();
        assert!(hit.ends_with("Pester/5.3.0/Pester.psd1"));
    }

    #[test]
    fn test_missing_manifest_is_corrupt() {
        let dir = tempdir().unwrap();
        install_fake_module(dir.path(), "Pester", "5.3.0", false);

        let spec = ModuleSpec::any("Pester");
        let err = find_local(&spec, &[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, Error::CorruptLocalModule { .. }));
    }

    #[test]
    fn test_later_search_path_entries_are_consulted() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        install_fake_module(second.path(), "Pester", "5.3.0", true);

        let spec = ModuleSpec::any("Pester");
        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert!(find_local(&spec, &paths).unwrap().is_some());
    }

    #[test]
    fn test_four_part_directories_parse() {
        let dir = tempdir().unwrap();
        install_fake_module(dir.path(), "Az.Accounts", "2.12.1.0", true);

        let spec = ModuleSpec::any("Az.Accounts");
        let hit = find_local(&spec, &[dir.path().to_path_buf()]).unwrap();
        assert!(hit.is_some());
    }
}
