//! Registration index wire model.
//!
//! Typed view of the NuGet v3 registration layout: an index document of
//! version-bucketed pages, each page holding per-version leaves whose
//! catalog entries carry the dependency groups. A page without inlined
//! leaves must be fetched through its `@id`.

use crate::error::Error;
use crate::range::VersionRange;
use crate::spec::ModuleSpec;
use serde::Deserialize;

/// Top-level registration index for one module.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationIndex {
    pub count: u64,
    #[serde(default)]
    pub items: Vec<RegistrationPage>,
}

/// A contiguous version bucket, bounded by `[lower, upper]` inclusive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPage {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    pub lower: String,
    pub upper: String,
    /// Inlined leaves; `None` means the page is behind its `@id` link.
    #[serde(default)]
    pub items: Option<Vec<RegistrationLeaf>>,
}

impl RegistrationPage {
    /// Copy each leaf's adjacent `packageContent` URI into its catalog
    /// entry, so downstream code can treat the URI as an entry attribute.
    pub fn attach_package_content(&mut self) {
        if let Some(leaves) = &mut self.items {
            for leaf in leaves {
                if leaf.catalog_entry.package_content.is_none() {
                    leaf.catalog_entry.package_content = leaf.package_content.clone();
                }
            }
        }
    }

    /// Whether the page's leaves are materialised in this document.
    #[must_use]
    pub fn is_inlined(&self) -> bool {
        self.items.is_some()
    }
}

/// A per-version record inside a page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationLeaf {
    pub catalog_entry: CatalogEntry,
    #[serde(default)]
    pub package_content: Option<String>,
}

/// The catalog entry of one module version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
    #[serde(default)]
    pub package_content: Option<String>,
}

impl CatalogEntry {
    /// Flatten the dependency groups into specs.
    ///
    /// An absent or empty range means "any version".
    pub fn dependency_specs(&self) -> Result<Vec<ModuleSpec>, Error> {
        let mut specs = Vec::new();
        for group in &self.dependency_groups {
            for dep in &group.dependencies {
                let range = match dep.range.as_deref() {
                    None | Some("") => VersionRange::any(),
                    Some(literal) => VersionRange::parse(literal)?,
                };
                specs.push(ModuleSpec::from_range(&dep.id, &range)?);
            }
        }
        Ok(specs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEntry {
    pub id: String,
    #[serde(default)]
    pub range: Option<String>,
}

/// Whether a registry version string denotes a pre-release.
#[must_use]
pub fn is_prerelease(version: &str) -> bool {
    version.contains('-')
}
