//! Hybrid version model.
//!
//! The registry and the on-disk module tree speak two version dialects: the
//! classical four-part form (`Major.Minor[.Build[.Revision]]`) and SemVer
//! 2.0. Planning happens entirely in SemVer space; this module owns the
//! bijection between the two and the boundary arithmetic used when turning
//! exclusive range bounds into inclusive ones.

use crate::error::Error;
use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Upper bound for every classical version part.
pub const PART_MAX: u64 = i32::MAX as u64;

/// Build-metadata tag marking a SemVer as classical-originated.
const SYSTEM_VERSION_TAG: &str = "SYSTEMVERSION";
/// Classical source had no build part.
const NOBUILD_TAG: &str = "NOBUILD";
/// Classical source carried a revision part.
const HASREVISION_TAG: &str = "HASREVISION";

/// Prefix for the revision pre-release identifier. SemVer 2.0 forbids
/// leading zeroes in numeric pre-release identifiers, so the revision is
/// carried as an alphanumeric identifier zero-padded to ten digits; the
/// fixed prefix and width keep lexicographic order equal to numeric order.
const REVISION_PREFIX: &str = "rev";

/// The smallest version, used to materialise absent lower bounds.
#[must_use]
pub fn min_version() -> Version {
    Version::new(0, 0, 0)
}

/// The defined maximum version, used to materialise absent upper bounds.
#[must_use]
pub fn max_version() -> Version {
    Version::new(PART_MAX, PART_MAX, PART_MAX)
}

/// A classical `Major.Minor[.Build[.Revision]]` version.
///
/// `build` and `revision` are optional; a revision without a build part is
/// unrepresentable and rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicalVersion {
    pub major: u64,
    pub minor: u64,
    pub build: Option<u64>,
    pub revision: Option<u64>,
}

impl ClassicalVersion {
    /// Create a classical version, validating part bounds and shape.
    pub fn new(
        major: u64,
        minor: u64,
        build: Option<u64>,
        revision: Option<u64>,
    ) -> Result<Self, Error> {
        if revision.is_some() && build.is_none() {
            return Err(Error::invalid_argument(
                "classical version cannot have a revision without a build part",
            ));
        }
        for part in [Some(major), Some(minor), build, revision].into_iter().flatten() {
            if part > PART_MAX {
                return Err(Error::invalid_argument(format!(
                    "version part {part} exceeds the maximum of {PART_MAX}"
                )));
            }
        }
        Ok(Self {
            major,
            minor,
            build,
            revision,
        })
    }

    /// Convert into the SemVer representation.
    ///
    /// The conversion is lossless: the build metadata records which
    /// classical shape produced the SemVer, and [`to_classical`] inverts it.
    #[must_use]
    pub fn to_semver(&self) -> Version {
        match (self.build, self.revision) {
            (None, _) => Version {
                major: self.major,
                minor: self.minor,
                patch: 0,
                pre: Prerelease::EMPTY,
                build: BuildMetadata::new(&format!("{NOBUILD_TAG}.{SYSTEM_VERSION_TAG}"))
                    .unwrap(),
            },
            (Some(build), None) => Version::new(self.major, self.minor, build),
            (Some(build), Some(revision)) => Version {
                major: self.major,
                minor: self.minor,
                // The patch shift keeps a revision-bearing version newer
                // than its base patch but older than the next patch,
                // because pre-release sorts before release.
                patch: build + 1,
                pre: Prerelease::new(&format!("{REVISION_PREFIX}{revision:010}")).unwrap(),
                build: BuildMetadata::new(&format!("{HASREVISION_TAG}.{SYSTEM_VERSION_TAG}"))
                    .unwrap(),
            },
        }
    }
}

impl fmt::Display for ClassicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
        }
        if let Some(revision) = self.revision {
            write!(f, ".{revision}")?;
        }
        Ok(())
    }
}

impl FromStr for ClassicalVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_argument("empty version string"));
        }
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() < 2 {
            return Err(Error::invalid_argument(format!(
                "classical version '{s}' needs at least major and minor parts"
            )));
        }
        if parts.len() > 4 {
            return Err(Error::invalid_argument(format!(
                "classical version '{s}' has more than four parts"
            )));
        }
        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            let n: u64 = part.parse().map_err(|_| {
                Error::invalid_argument(format!("invalid version part '{part}' in '{s}'"))
            })?;
            numbers.push(n);
        }
        Self::new(
            numbers[0],
            numbers[1],
            numbers.get(2).copied(),
            numbers.get(3).copied(),
        )
    }
}

impl Ord for ClassicalVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // An absent part sorts below zero, matching the -1 sentinel of the
        // classical scheme.
        let key = |v: &Self| {
            (
                v.major,
                v.minor,
                v.build.map_or(-1i64, |b| b as i64),
                v.revision.map_or(-1i64, |r| r as i64),
            )
        };
        key(self).cmp(&key(other))
    }
}

impl PartialOrd for ClassicalVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether this SemVer was produced from a classical version.
#[must_use]
pub fn is_classical_origin(version: &Version) -> bool {
    version
        .build
        .as_str()
        .split('.')
        .any(|tag| tag == SYSTEM_VERSION_TAG)
}

/// Convert a SemVer back into its classical form.
///
/// Follows the conversion markers when present. A SemVer without markers
/// maps directly to `Major.Minor.Patch`; pre-release and build labels on
/// such a version are dropped with a warning.
pub fn to_classical(version: &Version) -> Result<ClassicalVersion, Error> {
    let tags: Vec<&str> = version.build.as_str().split('.').collect();

    if !is_classical_origin(version) {
        if !version.pre.is_empty() || !version.build.is_empty() {
            tracing::warn!(
                version = %version,
                "dropping pre-release/build labels while converting to a classical version"
            );
        }
        return ClassicalVersion::new(
            version.major,
            version.minor,
            Some(version.patch),
            None,
        );
    }

    if tags.contains(&NOBUILD_TAG) {
        return ClassicalVersion::new(version.major, version.minor, None, None);
    }

    if tags.contains(&HASREVISION_TAG) {
        if version.patch == 0 {
            return Err(Error::invalid_argument(format!(
                "revision-marked version '{version}' has a zero patch"
            )));
        }
        let revision: u64 = version
            .pre
            .as_str()
            .strip_prefix(REVISION_PREFIX)
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "revision-marked version '{version}' has a malformed pre-release label"
                ))
            })?;
        return ClassicalVersion::new(
            version.major,
            version.minor,
            Some(version.patch - 1),
            Some(revision),
        );
    }

    Err(Error::invalid_argument(format!(
        "version '{version}' carries an unrecognised conversion marker"
    )))
}

/// Parse a version string that may be in either dialect.
///
/// Classical is tried first; anything it rejects falls back to a SemVer
/// literal. An empty string fails with `InvalidArgument`.
pub fn parse_either(input: &str) -> Result<Version, Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::invalid_argument("empty version string"));
    }
    if let Ok(classical) = ClassicalVersion::from_str(input) {
        return Ok(classical.to_semver());
    }
    Version::parse(input)
        .map_err(|e| Error::invalid_argument(format!("invalid version '{input}': {e}")))
}

/// The directory/file label for a resolved version.
///
/// Classical-originated versions use their classical spelling so the local
/// scanner (which parses folder names as classical versions) can find them
/// again; plain SemVer releases print as `M.m.p`; anything else keeps its
/// full SemVer form.
#[must_use]
pub fn folder_name(version: &Version) -> String {
    if is_classical_origin(version) {
        if let Ok(classical) = to_classical(version) {
            return classical.to_string();
        }
    }
    if version.pre.is_empty() && version.build.is_empty() {
        return format!("{}.{}.{}", version.major, version.minor, version.patch);
    }
    version.to_string()
}

fn strip_labels(version: &Version, op: &str) -> Version {
    // Conversion-marker labels are ours; only foreign labels get a warning.
    if !is_classical_origin(version) && (!version.pre.is_empty() || !version.build.is_empty()) {
        tracing::warn!(version = %version, "dropping pre-release/build labels for {op}");
    }
    Version::new(version.major, version.minor, version.patch)
}

/// Step a version down by the smallest representable amount.
pub fn decrement(version: &Version) -> Result<Version, Error> {
    let v = strip_labels(version, "decrement");
    if v.patch > 0 {
        Ok(Version::new(v.major, v.minor, v.patch - 1))
    } else if v.minor > 0 {
        Ok(Version::new(v.major, v.minor - 1, PART_MAX))
    } else if v.major > 0 {
        Ok(Version::new(v.major - 1, PART_MAX, PART_MAX))
    } else {
        Err(Error::invalid_argument("cannot decrement version 0.0.0"))
    }
}

/// Step a version up by the smallest representable amount, saturating each
/// field at the part maximum and cascading into the next-higher field.
pub fn increment(version: &Version) -> Result<Version, Error> {
    let v = strip_labels(version, "increment");
    if v.patch < PART_MAX {
        Ok(Version::new(v.major, v.minor, v.patch + 1))
    } else if v.minor < PART_MAX {
        Ok(Version::new(v.major, v.minor + 1, 0))
    } else if v.major < PART_MAX {
        Ok(Version::new(v.major + 1, 0, 0))
    } else {
        Err(Error::invalid_argument(
            "cannot increment the maximum version",
        ))
    }
}
