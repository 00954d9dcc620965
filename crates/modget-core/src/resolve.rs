//! Concurrent dependency planner.
//!
//! Walks the registry's registration indexes breadth-first while keeping
//! every fetch in flight concurrently: user specs seed a pending set of
//! index fetches, each completion selects the highest satisfying version,
//! plans it, and enqueues whichever of its dependencies the current plan
//! does not already satisfy. The driver is a single loop awaiting any
//! completion, so the plan accumulator needs no locking.

use crate::config::InstallConfig;
use crate::error::Error;
use crate::local::find_local;
use crate::progress::ProgressSink;
use crate::registration::{is_prerelease, CatalogEntry, RegistrationIndex, RegistrationPage};
use crate::registry::Registry;
use crate::spec::ModuleSpec;
use crate::version::parse_either;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use semver::Version;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// The result of a planning pass.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Required specs with download URIs, dependency-closed and
    /// deduplicated, sorted by canonical form.
    pub modules: Vec<ModuleSpec>,
    /// User requests skipped because a local module already satisfied them.
    pub satisfied_locally: Vec<ModuleSpec>,
}

/// A planned module plus every constraint that led to it. The origins feed
/// the termination-time consolidation pass.
#[derive(Debug, Clone)]
struct PlannedEntry {
    spec: ModuleSpec,
    version: Version,
    origins: Vec<ModuleSpec>,
}

type IndexCompletion = (ModuleSpec, Result<RegistrationIndex, Error>);

/// Build an install plan for the given user specs.
pub async fn build_plan<R: Registry>(
    registry: &R,
    requests: &[ModuleSpec],
    config: &InstallConfig,
    cancel: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<Plan, Error> {
    build_plan_with(registry, requests, &[], config, cancel, progress).await
}

/// Build an install plan on top of an already-resolved seed.
///
/// Seed entries must be required specs (a previous plan's modules); they
/// count as planned from the start, so re-planning against an unchanged
/// registry adds nothing.
pub async fn build_plan_with<'a, R: Registry>(
    registry: &'a R,
    requests: &[ModuleSpec],
    seed: &[ModuleSpec],
    config: &InstallConfig,
    cancel: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<Plan, Error> {
    let mut planned: Vec<PlannedEntry> = Vec::with_capacity(seed.len() + requests.len());
    for entry in seed {
        let Some(version) = entry.required_version() else {
            return Err(Error::invalid_argument(format!(
                "plan seed entry {entry} is not an exact-version spec"
            )));
        };
        planned.push(PlannedEntry {
            spec: entry.clone(),
            version: version.clone(),
            origins: vec![entry.clone()],
        });
    }

    let mut satisfied_locally = Vec::new();
    let mut inflight: HashSet<String> = HashSet::new();
    let mut pending: FuturesUnordered<BoxFuture<'a, IndexCompletion>> = FuturesUnordered::new();

    for request in requests {
        if !config.update && satisfied_by_local(request, config) {
            satisfied_locally.push(request.clone());
            continue;
        }
        enqueue_fetch(registry, &mut pending, &mut inflight, progress, request.clone());
    }

    while !pending.is_empty() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (origin, result) = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            completed = pending.next() => match completed {
                Some(completion) => completion,
                None => break,
            },
        };

        let index = result?;
        if index.count == 0 || index.items.is_empty() {
            return Err(Error::invalid_response(
                origin.name(),
                "registration index has no pages",
            ));
        }

        let mut pages = index.items;
        for page in &mut pages {
            page.attach_package_content();
        }

        // Inlined fast path: leaves materialised in the index document.
        let inlined: Vec<&CatalogEntry> = pages
            .iter()
            .filter_map(|page| page.items.as_ref())
            .flatten()
            .map(|leaf| &leaf.catalog_entry)
            .collect();
        let mut selected = select_entry(&inlined, &origin, config.prerelease)?;

        if selected.is_none() {
            selected =
                scan_pages(registry, &pages, &origin, config.prerelease, cancel).await?;
        }

        let Some((version, entry)) = selected else {
            return Err(Error::NoSatisfyingVersion {
                spec: origin.canonical(),
            });
        };

        let resolved = resolve_entry(&origin, &version, &entry)?;

        if let Some(existing) = planned.iter_mut().find(|p| p.spec == resolved) {
            // Another constraint already planned this exact version;
            // remember why and stop processing this completion.
            existing.origins.push(origin);
            continue;
        }

        tracing::debug!(module = %resolved, "planned");
        progress.resolved(&resolved);
        planned.push(PlannedEntry {
            spec: resolved,
            version: version.clone(),
            origins: vec![origin],
        });

        for dep in entry.dependency_specs()? {
            if !should_enqueue(&planned, &dep) {
                record_satisfied_origin(&mut planned, dep);
                continue;
            }
            if !config.update && satisfied_by_local(&dep, config) {
                tracing::debug!(dep = %dep, "dependency satisfied locally");
                continue;
            }
            enqueue_fetch(registry, &mut pending, &mut inflight, progress, dep);
        }
    }

    let planned = consolidate(planned);

    let mut modules: Vec<ModuleSpec> = planned.into_iter().map(|entry| entry.spec).collect();
    modules.sort_by_key(ModuleSpec::canonical);

    Ok(Plan {
        modules,
        satisfied_locally,
    })
}

/// Check the local scanner, treating scanner failures as "not found"
/// (non-fatal to planning).
fn satisfied_by_local(spec: &ModuleSpec, config: &InstallConfig) -> bool {
    match find_local(spec, &config.search_paths) {
        Ok(Some(manifest)) => {
            tracing::debug!(spec = %spec, manifest = %manifest.display(), "satisfied locally");
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(spec = %spec, error = %e, "local scan failed, resolving from registry");
            false
        }
    }
}

fn enqueue_fetch<'a, R: Registry>(
    registry: &'a R,
    pending: &mut FuturesUnordered<BoxFuture<'a, IndexCompletion>>,
    inflight: &mut HashSet<String>,
    progress: &dyn ProgressSink,
    spec: ModuleSpec,
) {
    if !inflight.insert(spec.canonical()) {
        tracing::debug!(spec = %spec, "suppressing duplicate in-flight fetch");
        return;
    }
    progress.resolving(spec.name());
    pending.push(Box::pin(async move {
        let result = registry.fetch_index(spec.name()).await;
        (spec, result)
    }));
}

/// Pick the highest version among `entries` that satisfies `spec`.
///
/// Exactly one catalog entry must carry the winning version; more than one
/// is an internal invariant violation.
fn select_entry(
    entries: &[&CatalogEntry],
    spec: &ModuleSpec,
    prerelease: bool,
) -> Result<Option<(Version, CatalogEntry)>, Error> {
    let mut best: Option<(Version, &CatalogEntry)> = None;
    let mut best_count = 0usize;

    for &entry in entries {
        if !prerelease && is_prerelease(&entry.version) {
            continue;
        }
        let version = match parse_either(&entry.version) {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(
                    module = %entry.id,
                    version = %entry.version,
                    error = %e,
                    "skipping leaf with unparseable version"
                );
                continue;
            }
        };
        if !spec.matches(&version) {
            continue;
        }
        match &best {
            Some((current, _)) => match version.cmp_precedence(current) {
                Ordering::Greater => {
                    best = Some((version, entry));
                    best_count = 1;
                }
                Ordering::Equal => best_count += 1,
                Ordering::Less => {}
            },
            None => {
                best = Some((version, entry));
                best_count = 1;
            }
        }
    }

    match best {
        None => Ok(None),
        Some(_) if best_count != 1 => Err(Error::internal(format!(
            "expected exactly one catalog entry for {spec} at the selected version, found {best_count}"
        ))),
        Some((version, entry)) => Ok(Some((version, (*entry).clone()))),
    }
}

/// Fetch every non-inlined page that might hold a satisfying version and
/// re-run selection over the merged leaves.
async fn scan_pages<R: Registry>(
    registry: &R,
    pages: &[RegistrationPage],
    spec: &ModuleSpec,
    prerelease: bool,
    cancel: &CancellationToken,
) -> Result<Option<(Version, CatalogEntry)>, Error> {
    let mut uris = Vec::new();
    for page in pages {
        if page.is_inlined() || !page_may_satisfy(page, spec)? {
            continue;
        }
        let uri = page.id.clone().ok_or_else(|| {
            Error::invalid_response(spec.name(), "page has neither inlined items nor an @id")
        })?;
        uris.push(uri);
    }
    if uris.is_empty() {
        return Ok(None);
    }

    tracing::debug!(spec = %spec, pages = uris.len(), "scanning registration pages");
    let fetches = uris.iter().map(|uri| registry.fetch_page(uri));
    let mut fetched = tokio::select! {
        () = cancel.cancelled() => return Err(Error::Cancelled),
        result = futures::future::try_join_all(fetches) => result?,
    };
    for page in &mut fetched {
        page.attach_package_content();
    }

    let leaves: Vec<&CatalogEntry> = fetched
        .iter()
        .filter_map(|page| page.items.as_ref())
        .flatten()
        .map(|leaf| &leaf.catalog_entry)
        .collect();
    select_entry(&leaves, spec, prerelease)
}

/// Whether a page's `[lower, upper]` interval might contain a version
/// satisfying `spec`.
fn page_may_satisfy(page: &RegistrationPage, spec: &ModuleSpec) -> Result<bool, Error> {
    let lower = parse_either(&page.lower)
        .map_err(|e| Error::invalid_response(spec.name(), format!("bad page lower bound: {e}")))?;
    let upper = parse_either(&page.upper)
        .map_err(|e| Error::invalid_response(spec.name(), format!("bad page upper bound: {e}")))?;

    let le = |a: &Version, b: &Version| a.cmp_precedence(b) != Ordering::Greater;

    if let Some(required) = spec.required_version() {
        return Ok(le(&lower, required) && le(required, &upper));
    }

    let lo = spec.min();
    let hi = spec.max();
    Ok((le(lo, &lower) && le(&upper, hi))
        || (le(&lower, lo) && le(lo, &upper))
        || (le(&lower, hi) && le(hi, &upper)))
}

fn resolve_entry(
    origin: &ModuleSpec,
    version: &Version,
    entry: &CatalogEntry,
) -> Result<ModuleSpec, Error> {
    let content = entry.package_content.as_deref().ok_or_else(|| {
        Error::invalid_response(
            origin.name(),
            format!("leaf for version {version} is missing packageContent"),
        )
    })?;
    let uri = Url::parse(content).map_err(|e| {
        Error::invalid_response(origin.name(), format!("bad packageContent URI: {e}"))
    })?;
    Ok(ModuleSpec::required(entry.id.clone(), version.clone())
        .with_guid(origin.guid())?
        .with_download_uri(uri))
}

/// The dependency admission filter: enqueue a discovered dependency only
/// when no already-planned version of that module satisfies it.
fn should_enqueue(planned: &[PlannedEntry], dep: &ModuleSpec) -> bool {
    let mut versions: Vec<&Version> = planned
        .iter()
        .filter(|entry| entry.spec.name() == dep.name())
        .map(|entry| &entry.version)
        .collect();
    if versions.is_empty() {
        return true;
    }
    versions.sort_by(|a, b| b.cmp_precedence(a));
    let top = versions[0];

    if dep.has_min() && dep.min().cmp_precedence(top) == Ordering::Greater {
        return true;
    }
    if dep.has_max() && dep.max().cmp_precedence(top) == Ordering::Less {
        return true;
    }
    if let Some(required) = dep.required_version() {
        if !versions
            .iter()
            .any(|v| v.cmp_precedence(required) == Ordering::Equal)
        {
            return true;
        }
    }
    false
}

/// Attach a dependency that the plan already satisfies to the highest
/// planned entry matching it, so consolidation knows every constraint.
fn record_satisfied_origin(planned: &mut [PlannedEntry], dep: ModuleSpec) {
    let mut best: Option<usize> = None;
    for (i, entry) in planned.iter().enumerate() {
        if entry.spec.name() == dep.name() && dep.matches(&entry.version) {
            best = match best {
                Some(j)
                    if planned[j].version.cmp_precedence(&entry.version)
                        != Ordering::Less =>
                {
                    Some(j)
                }
                _ => Some(i),
            };
        }
    }
    if let Some(i) = best {
        planned[i].origins.push(dep);
    }
}

/// Collapse redundant same-name entries.
///
/// When several versions of one module were planned concurrently, and a
/// single planned version satisfies every constraint recorded for that
/// module, the other entries are dropped. This keeps the plan content
/// independent of task completion order without a constraint solver: each
/// surviving entry is still the highest version satisfying its admitted
/// constraints.
fn consolidate(planned: Vec<PlannedEntry>) -> Vec<PlannedEntry> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, entry) in planned.iter().enumerate() {
        by_name.entry(entry.spec.name()).or_default().push(i);
    }

    let mut keep = vec![true; planned.len()];
    for indexes in by_name.values() {
        if indexes.len() < 2 {
            continue;
        }
        let origins: Vec<&ModuleSpec> = indexes
            .iter()
            .flat_map(|&i| planned[i].origins.iter())
            .collect();

        let mut winner: Option<usize> = None;
        for &i in indexes {
            let version = &planned[i].version;
            if origins.iter().all(|origin| origin.matches(version)) {
                winner = match winner {
                    Some(j)
                        if planned[j].version.cmp_precedence(version)
                            != Ordering::Less =>
                    {
                        Some(j)
                    }
                    _ => Some(i),
                };
            }
        }

        if let Some(w) = winner {
            for &i in indexes {
                if i != w {
                    tracing::debug!(
                        dropped = %planned[i].spec,
                        kept = %planned[w].spec,
                        "consolidated redundant plan entry"
                    );
                    keep[i] = false;
                }
            }
        }
    }

    planned
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| keep[i].then_some(entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::registry::fixtures::FixtureRegistry;
    use serde_json::{json, Value};

    fn leaf(name: &str, version: &str, deps: &[(&str, &str)]) -> Value {
        let dependencies: Vec<Value> = deps
            .iter()
            .map(|(id, range)| json!({ "id": id, "range": range }))
            .collect();
        json!({
            "catalogEntry": {
                "id": name,
                "version": version,
                "dependencyGroups": [{ "dependencies": dependencies }]
            },
            "packageContent": format!("https://registry.test/{name}.{version}.nupkg")
        })
    }

    fn inline_index(name: &str, versions: &[&str], deps: &[(&str, &str)]) -> Value {
        let leaves: Vec<Value> = versions.iter().map(|v| leaf(name, v, deps)).collect();
        json!({
            "count": 1,
            "items": [{
                "lower": versions.first().copied().unwrap_or("0.0.0"),
                "upper": versions.last().copied().unwrap_or("0.0.0"),
                "items": leaves
            }]
        })
    }

    fn test_config() -> InstallConfig {
        InstallConfig::default()
            .with_search_paths(Vec::new())
            .with_update(false)
            .with_prerelease(false)
    }

    async fn plan_for(
        registry: &FixtureRegistry,
        requests: &[&str],
        config: &InstallConfig,
    ) -> Result<Plan, Error> {
        let specs: Vec<ModuleSpec> = requests
            .iter()
            .map(|s| ModuleSpec::parse(s).unwrap())
            .collect();
        build_plan(
            registry,
            &specs,
            config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
    }

    fn names_and_versions(plan: &Plan) -> Vec<String> {
        plan.modules.iter().map(ModuleSpec::canonical).collect()
    }

    #[tokio::test]
    async fn test_highest_inlined_version_wins() {
        let registry = FixtureRegistry::new()
            .with_index("A", inline_index("A", &["1.0.0", "1.1.0", "2.0.0"], &[]));
        let plan = plan_for(&registry, &["A"], &test_config()).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@2.0.0"]);
        assert!(plan.modules[0].download_uri().is_some());
    }

    #[tokio::test]
    async fn test_page_scan_path() {
        let page_uri = "https://registry.test/registration/A/page/1.0.0/1.5.0.json";
        let registry = FixtureRegistry::new()
            .with_index(
                "A",
                json!({
                    "count": 1,
                    "items": [{ "@id": page_uri, "lower": "1.0.0", "upper": "1.5.0" }]
                }),
            )
            .with_page(
                page_uri,
                json!({
                    "lower": "1.0.0",
                    "upper": "1.5.0",
                    "items": [leaf("A", "1.0.0", &[]), leaf("A", "1.5.0", &[])]
                }),
            );
        let plan = plan_for(&registry, &["A@1.0.0"], &test_config()).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@1.0.0"]);
    }

    #[tokio::test]
    async fn test_dependency_closure() {
        let registry = FixtureRegistry::new()
            .with_index(
                "A",
                inline_index("A", &["2.0.0"], &[("B", "[1.0.0,2.0.0)")]),
            )
            .with_index("B", inline_index("B", &["1.0.0", "1.5.0", "2.0.0"], &[]));
        let plan = plan_for(&registry, &["A"], &test_config()).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@2.0.0", "B@1.5.0"]);
    }

    #[tokio::test]
    async fn test_required_dependency_wins_over_highest() {
        let registry = FixtureRegistry::new()
            .with_index("A", inline_index("A", &["1.0.0"], &[("C", "[1.0.0]")]))
            .with_index("B", inline_index("B", &["1.0.0"], &[("C", "[1.0.0,2.0.0)")]))
            .with_index("C", inline_index("C", &["1.0.0", "1.2.0"], &[]));

        // The plan must come out the same whichever order the user listed
        // the roots (and whichever fetch completes first).
        for requests in [["A", "B"], ["B", "A"]] {
            let plan = plan_for(&registry, &requests, &test_config()).await.unwrap();
            assert_eq!(
                names_and_versions(&plan),
                vec!["A@1.0.0", "B@1.0.0", "C@1.0.0"],
                "requests: {requests:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_no_satisfying_version() {
        let registry =
            FixtureRegistry::new().with_index("A", inline_index("A", &["1.0.0"], &[]));
        let err = plan_for(&registry, &["A@9.9.9"], &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSatisfyingVersion { .. }));
    }

    #[tokio::test]
    async fn test_missing_module_is_not_found() {
        let registry = FixtureRegistry::new().with_missing("A");
        let err = plan_for(&registry, &["A"], &test_config()).await.unwrap_err();
        match err {
            Error::NotFound { name } => assert_eq!(name, "A"),
            other => panic!("expected NotFound, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_index_is_invalid() {
        let registry = FixtureRegistry::new().with_index("A", json!({ "count": 0, "items": [] }));
        let err = plan_for(&registry, &["A"], &test_config()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRegistryResponse { .. }));
    }

    #[tokio::test]
    async fn test_prerelease_filtering() {
        let registry = FixtureRegistry::new()
            .with_index("A", inline_index("A", &["1.0.0", "2.0.0-beta.1"], &[]));

        let plan = plan_for(&registry, &["A"], &test_config()).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@1.0.0"]);

        let config = test_config().with_prerelease(true);
        let plan = plan_for(&registry, &["A"], &config).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@2.0.0-beta.1"]);
    }

    #[tokio::test]
    async fn test_locally_satisfied_request_is_skipped() {
        let modules = tempfile::tempdir().unwrap();
        let version_dir = modules.path().join("A").join("9.0.0");
        std::fs::create_dir_all(&version_dir).unwrap();
        std::fs::write(version_dir.join("A.psd1"), "@{}").unwrap();

        let registry =
            FixtureRegistry::new().with_index("A", inline_index("A", &["1.0.0"], &[]));
        let config = test_config().with_search_paths(vec![modules.path().to_path_buf()]);

        let plan = plan_for(&registry, &["A"], &config).await.unwrap();
        assert!(plan.modules.is_empty());
        assert_eq!(plan.satisfied_locally.len(), 1);

        // With update set, the local install is ignored.
        let config = config.with_update(true);
        let plan = plan_for(&registry, &["A"], &config).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@1.0.0"]);
    }

    #[tokio::test]
    async fn test_duplicate_requests_resolve_once() {
        let registry =
            FixtureRegistry::new().with_index("A", inline_index("A", &["1.0.0"], &[]));
        let plan = plan_for(&registry, &["A", "A"], &test_config()).await.unwrap();
        assert_eq!(names_and_versions(&plan), vec!["A@1.0.0"]);
    }

    #[tokio::test]
    async fn test_replanning_with_seed_is_idempotent() {
        let registry = FixtureRegistry::new()
            .with_index(
                "A",
                inline_index("A", &["2.0.0"], &[("B", "[1.0.0,2.0.0)")]),
            )
            .with_index("B", inline_index("B", &["1.5.0"], &[]));
        let config = test_config();

        let first = plan_for(&registry, &["A"], &config).await.unwrap();

        let requests = vec![ModuleSpec::parse("A").unwrap()];
        let second = build_plan_with(
            &registry,
            &requests,
            &first.modules,
            &config,
            &CancellationToken::new(),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(names_and_versions(&first), names_and_versions(&second));
    }

    #[tokio::test]
    async fn test_cancellation_stops_planning() {
        let registry =
            FixtureRegistry::new().with_index("A", inline_index("A", &["1.0.0"], &[]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let requests = vec![ModuleSpec::parse("A").unwrap()];
        let err = build_plan(&registry, &requests, &test_config(), &cancel, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_page_selection_predicate() {
        let page: RegistrationPage = serde_json::from_value(json!({
            "lower": "1.0.0",
            "upper": "2.0.0"
        }))
        .unwrap();

        // Required version inside and outside the bucket.
        let inside = ModuleSpec::parse("A@1.5.0").unwrap();
        let outside = ModuleSpec::parse("A@3.0.0").unwrap();
        assert!(page_may_satisfy(&page, &inside).unwrap());
        assert!(!page_may_satisfy(&page, &outside).unwrap());

        // Range subsuming the page.
        let subsumes = ModuleSpec::bounded("A", Version::new(0, 1, 0), Version::new(9, 0, 0)).unwrap();
        assert!(page_may_satisfy(&page, &subsumes).unwrap());

        // Lower endpoint inside the page.
        let lower_in = ModuleSpec::bounded("A", Version::new(1, 5, 0), Version::new(9, 0, 0)).unwrap();
        assert!(page_may_satisfy(&page, &lower_in).unwrap());

        // Upper endpoint inside the page.
        let upper_in = ModuleSpec::bounded("A", Version::new(0, 1, 0), Version::new(1, 2, 0)).unwrap();
        assert!(page_may_satisfy(&page, &upper_in).unwrap());

        // Disjoint below.
        let below = ModuleSpec::bounded("A", Version::new(0, 1, 0), Version::new(0, 9, 0)).unwrap();
        assert!(!page_may_satisfy(&page, &below).unwrap());
    }

    #[test]
    fn test_admission_filter() {
        let planned = vec![PlannedEntry {
            spec: ModuleSpec::required("C", Version::new(1, 2, 0)),
            version: Version::new(1, 2, 0),
            origins: Vec::new(),
        }];

        // Satisfied by the planned top version.
        let open = ModuleSpec::any("C");
        assert!(!should_enqueue(&planned, &open));

        let compatible =
            ModuleSpec::bounded("C", Version::new(1, 0, 0), Version::new(2, 0, 0)).unwrap();
        assert!(!should_enqueue(&planned, &compatible));

        // Needs something newer.
        let newer = ModuleSpec::bounded("C", Version::new(2, 0, 0), crate::version::max_version())
            .unwrap();
        assert!(should_enqueue(&planned, &newer));

        // Needs something older.
        let older =
            ModuleSpec::bounded("C", crate::version::min_version(), Version::new(1, 0, 0)).unwrap();
        assert!(should_enqueue(&planned, &older));

        // Exact version not yet planned.
        let required = ModuleSpec::required("C", Version::new(1, 0, 0));
        assert!(should_enqueue(&planned, &required));

        // Exact version already planned.
        let same = ModuleSpec::required("C", Version::new(1, 2, 0));
        assert!(!should_enqueue(&planned, &same));

        // Unknown module name.
        let other = ModuleSpec::any("D");
        assert!(should_enqueue(&planned, &other));
    }

    #[test]
    fn test_consolidation_prefers_version_satisfying_all() {
        let required_origin = ModuleSpec::parse("C@1.0.0").unwrap();
        let range_origin =
            ModuleSpec::bounded("C", Version::new(1, 0, 0), Version::new(1, 9, 0)).unwrap();

        let planned = vec![
            PlannedEntry {
                spec: ModuleSpec::required("C", Version::new(1, 2, 0)),
                version: Version::new(1, 2, 0),
                origins: vec![range_origin],
            },
            PlannedEntry {
                spec: ModuleSpec::required("C", Version::new(1, 0, 0)),
                version: Version::new(1, 0, 0),
                origins: vec![required_origin],
            },
        ];

        let consolidated = consolidate(planned);
        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_consolidation_keeps_incompatible_versions() {
        let v1_origin = ModuleSpec::parse("C@1.0.0").unwrap();
        let v2_origin = ModuleSpec::parse("C@2.0.0").unwrap();

        let planned = vec![
            PlannedEntry {
                spec: ModuleSpec::required("C", Version::new(1, 0, 0)),
                version: Version::new(1, 0, 0),
                origins: vec![v1_origin],
            },
            PlannedEntry {
                spec: ModuleSpec::required("C", Version::new(2, 0, 0)),
                version: Version::new(2, 0, 0),
                origins: vec![v2_origin],
            },
        ];

        assert_eq!(consolidate(planned).len(), 2);
    }
}
