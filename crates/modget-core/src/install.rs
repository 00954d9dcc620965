//! Parallel download and extract pipeline.
//!
//! Consumes a resolved plan and materialises each module on disk: the
//! archive is streamed into the cache (`{cache}/{Name}.{Version}.nupkg`),
//! then unpacked into `{destination}/{Name}/{Version}`. Downloads overlap
//! across modules; extraction is CPU-bound and runs on the blocking thread
//! pool so it never stalls other downloads. The first failure cancels the
//! shared token and fails the whole install; partial state is left as-is.

use crate::config::InstallConfig;
use crate::error::Error;
use crate::progress::ProgressSink;
use crate::registry::Registry;
use crate::spec::ModuleSpec;
use crate::version::folder_name;
use futures::stream::{self, StreamExt};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Maximum concurrent per-module pipelines.
const MAX_CONCURRENT_INSTALLS: usize = 32;

/// One materialised module.
#[derive(Debug, Clone)]
pub struct InstalledModule {
    pub spec: ModuleSpec,
    /// The archive was already present in the cache.
    pub from_cache: bool,
    /// The extracted module version directory.
    pub destination: PathBuf,
}

/// Download and extract every module in the plan.
pub async fn install_plan<R: Registry>(
    registry: &R,
    plan: &[ModuleSpec],
    config: &InstallConfig,
    cancel: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<Vec<InstalledModule>, Error> {
    let mut pipelines = stream::iter(plan.iter().cloned())
        .map(|spec| install_one(registry, spec, config, cancel, progress))
        .buffer_unordered(MAX_CONCURRENT_INSTALLS);

    let mut installed = Vec::with_capacity(plan.len());
    while let Some(result) = pipelines.next().await {
        match result {
            Ok(module) => installed.push(module),
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        }
    }
    Ok(installed)
}

async fn install_one<R: Registry>(
    registry: &R,
    spec: ModuleSpec,
    config: &InstallConfig,
    cancel: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<InstalledModule, Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let Some(version) = spec.required_version() else {
        return Err(Error::invalid_argument(format!(
            "plan entry {spec} is not an exact-version spec"
        )));
    };
    let label = folder_name(version);
    let cache_path = config
        .cache_dir
        .join(format!("{}.{}.nupkg", spec.name(), label));

    let from_cache = matches!(fs::metadata(&cache_path), Ok(meta) if meta.len() > 0);
    if !from_cache {
        download_archive(registry, &spec, &cache_path, cancel).await?;
    }
    tracing::debug!(module = %spec, from_cache, "archive ready");
    progress.downloaded(&spec, from_cache);

    // Extraction must not start once cancellation has been observed.
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let dest_dir = config.destination.join(spec.name()).join(&label);
    let archive_path = cache_path.clone();
    let extract_dir = dest_dir.clone();
    let spec_label = spec.canonical();
    tokio::task::spawn_blocking(move || extract_archive(&archive_path, &extract_dir, &spec_label))
        .await
        .map_err(|e| Error::internal(format!("extract worker panicked: {e}")))??;

    tracing::debug!(module = %spec, dest = %dest_dir.display(), "extracted");
    progress.extracted(&spec);

    Ok(InstalledModule {
        spec,
        from_cache,
        destination: dest_dir,
    })
}

/// Stream the module archive into its cache file.
///
/// Both the network reader and the file writer are closed before this
/// returns, so the extract worker sees a finished, unlocked file.
async fn download_archive<R: Registry>(
    registry: &R,
    spec: &ModuleSpec,
    cache_path: &Path,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let uri = spec.download_uri().ok_or_else(|| {
        Error::internal(format!("plan entry {spec} has no download URI"))
    })?;

    if let Some(parent) = cache_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut body = registry.open_archive(uri.as_str()).await?;
    let mut file = tokio::fs::File::create(cache_path).await?;

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = body.next() => chunk,
        };
        match chunk {
            Some(chunk) => file.write_all(&chunk?).await?,
            None => break,
        }
    }
    file.flush().await?;
    Ok(())
}

/// Unpack a zip archive into the destination directory, overwriting
/// existing files.
fn extract_archive(archive_path: &Path, dest: &Path, spec: &str) -> Result<(), Error> {
    let extract_err = |reason: String| Error::Extract {
        spec: spec.to_string(),
        reason,
    };

    let file = File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| extract_err(format!("not a zip archive: {e}")))?;

    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extract_err(format!("unreadable archive entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(extract_err(format!(
                "archive entry '{}' escapes the destination",
                entry.name()
            )));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::registry::fixtures::FixtureRegistry;
    use bytes::Bytes;
    use std::io::Write;
    use tempfile::tempdir;
    use url::Url;

    fn module_archive(name: &str) -> Bytes {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file(format!("{name}.psd1"), options).unwrap();
            writer
                .write_all(b"@{ ModuleVersion = '1.0.0' }")
                .unwrap();
            writer.start_file("lib/functions.psm1", options).unwrap();
            writer.write_all(b"function Get-Thing {}").unwrap();
            writer.finish().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    fn planned(name: &str, version: &str) -> ModuleSpec {
        ModuleSpec::parse(&format!("{name}@{version}"))
            .unwrap()
            .with_download_uri(
                Url::parse(&format!("https://registry.test/{name}.{version}.nupkg")).unwrap(),
            )
    }

    fn test_dirs() -> (tempfile::TempDir, InstallConfig) {
        let root = tempdir().unwrap();
        let config = InstallConfig::default()
            .with_destination(root.path().join("Modules"))
            .with_cache_dir(root.path().join("cache"));
        (root, config)
    }

    #[tokio::test]
    async fn test_install_places_manifest() {
        let (_root, config) = test_dirs();
        let registry = FixtureRegistry::new()
            .with_archive("https://registry.test/A.1.0.0.nupkg", module_archive("A"));

        let plan = vec![planned("A", "1.0.0")];
        let installed = install_plan(
            &registry,
            &plan,
            &config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(installed.len(), 1);
        assert!(!installed[0].from_cache);
        let manifest = config.destination.join("A").join("1.0.0").join("A.psd1");
        assert!(manifest.is_file());
        assert!(config
            .destination
            .join("A")
            .join("1.0.0")
            .join("lib")
            .join("functions.psm1")
            .is_file());
        assert!(config.cache_dir.join("A.1.0.0.nupkg").is_file());
    }

    #[tokio::test]
    async fn test_classical_versions_use_classical_folder() {
        let (_root, config) = test_dirs();
        let registry = FixtureRegistry::new().with_archive(
            "https://registry.test/Az.2.12.1.0.nupkg",
            module_archive("Az"),
        );

        let plan = vec![planned("Az", "2.12.1.0")];
        install_plan(
            &registry,
            &plan,
            &config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();

        assert!(config
            .destination
            .join("Az")
            .join("2.12.1.0")
            .join("Az.psd1")
            .is_file());
    }

    #[tokio::test]
    async fn test_cached_archive_skips_download() {
        let (_root, config) = test_dirs();
        fs::create_dir_all(&config.cache_dir).unwrap();
        fs::write(
            config.cache_dir.join("A.1.0.0.nupkg"),
            module_archive("A"),
        )
        .unwrap();

        // The fixture has no archive, so a download attempt would fail.
        let registry = FixtureRegistry::new();
        let plan = vec![planned("A", "1.0.0")];
        let installed = install_plan(
            &registry,
            &plan,
            &config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();

        assert!(installed[0].from_cache);
        assert!(config
            .destination
            .join("A")
            .join("1.0.0")
            .join("A.psd1")
            .is_file());
    }

    #[tokio::test]
    async fn test_failure_cancels_siblings() {
        let (_root, config) = test_dirs();
        let registry = FixtureRegistry::new()
            .with_archive("https://registry.test/A.1.0.0.nupkg", module_archive("A"));

        // B's archive is missing; its failure must trip the shared token.
        let plan = vec![planned("A", "1.0.0"), planned("B", "1.0.0")];
        let cancel = CancellationToken::new();
        let result = install_plan(&registry, &plan, &config, &cancel, &NoProgress).await;

        assert!(result.is_err());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_pipeline() {
        let (_root, config) = test_dirs();
        let registry = FixtureRegistry::new()
            .with_archive("https://registry.test/A.1.0.0.nupkg", module_archive("A"));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let plan = vec![planned("A", "1.0.0")];
        let err = install_plan(&registry, &plan, &config, &cancel, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        // No extraction after cancellation was observed.
        assert!(!config.destination.join("A").exists());
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails_extraction() {
        let (_root, config) = test_dirs();
        fs::create_dir_all(&config.cache_dir).unwrap();
        fs::write(config.cache_dir.join("A.1.0.0.nupkg"), b"not a zip").unwrap();

        let registry = FixtureRegistry::new();
        let plan = vec![planned("A", "1.0.0")];
        let err = install_plan(
            &registry,
            &plan,
            &config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Extract { .. }));
    }

    #[tokio::test]
    async fn test_empty_plan_is_a_no_op() {
        let (_root, config) = test_dirs();
        let registry = FixtureRegistry::new();
        let installed = install_plan(
            &registry,
            &[],
            &config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();
        assert!(installed.is_empty());
    }

    #[test]
    fn test_extract_overwrites_existing_files() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("A.zip");
        fs::write(&archive_path, module_archive("A")).unwrap();

        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("A.psd1"), "stale contents").unwrap();

        extract_archive(&archive_path, &dest, "A@1.0.0").unwrap();
        let body = fs::read_to_string(dest.join("A.psd1")).unwrap();
        assert!(body.contains("ModuleVersion"));
    }
}
