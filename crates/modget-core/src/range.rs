//! NuGet version range literals.
//!
//! Ranges arrive from two places: user input and the `range` field of a
//! registry dependency entry. The grammar is the NuGet interval notation:
//! a bare token is an exact match, brackets are inclusive bounds, parens
//! exclusive, and an empty side leaves that bound open.

use crate::error::Error;
use crate::version::{self, parse_either};
use semver::Version;

/// A parsed NuGet version range.
///
/// `None` bounds are open; [`VersionRange::materialised_min`] and
/// [`VersionRange::materialised_max`] substitute the defined minimum and
/// maximum versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Option<Version>,
    pub max: Option<Version>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

impl VersionRange {
    /// The unconstrained range, produced by an empty literal ("any version").
    #[must_use]
    pub fn any() -> Self {
        Self {
            min: None,
            max: None,
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// An exact range `[v, v]`.
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(version.clone()),
            max: Some(version),
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// Parse a NuGet range literal.
    ///
    /// - `X` or `[X]` — exact.
    /// - `[a,b]`, `[a,b)`, `(a,b]`, `(a,b)` — bounded interval.
    /// - `[a,]`, `(a,)` — unbounded upper; `[,b]`, `[,b)` — unbounded lower.
    /// - empty string — any version.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::any());
        }

        let open = input.starts_with('[') || input.starts_with('(');
        if !open {
            // Bare token: exact match.
            return Ok(Self::exact(parse_either(input)?));
        }

        let min_inclusive = input.starts_with('[');
        let max_inclusive = input.ends_with(']');
        if !max_inclusive && !input.ends_with(')') {
            return Err(Error::invalid_argument(format!(
                "version range '{input}' is missing a closing bracket"
            )));
        }

        let inner = &input[1..input.len() - 1];
        let parts: Vec<&str> = inner.split(',').collect();
        match parts.as_slice() {
            [single] => {
                // `[X]` is the exact form; an exclusive single bound like
                // `(X)` matches nothing and is rejected.
                if !min_inclusive || !max_inclusive {
                    return Err(Error::invalid_argument(format!(
                        "version range '{input}' excludes its only version"
                    )));
                }
                Ok(Self::exact(parse_either(single)?))
            }
            [lo, hi] => {
                let min = parse_bound(lo)?;
                let max = parse_bound(hi)?;
                Ok(Self {
                    min,
                    max,
                    min_inclusive,
                    max_inclusive,
                })
            }
            _ => Err(Error::invalid_argument(format!(
                "version range '{input}' has too many commas"
            ))),
        }
    }

    /// The lower bound with the defined minimum substituted when open.
    #[must_use]
    pub fn materialised_min(&self) -> Version {
        self.min.clone().unwrap_or_else(version::min_version)
    }

    /// The upper bound with the defined maximum substituted when open.
    #[must_use]
    pub fn materialised_max(&self) -> Version {
        self.max.clone().unwrap_or_else(version::max_version)
    }

    /// Whether a version lies within the range.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(min) = &self.min {
            let ok = if self.min_inclusive {
                version >= min
            } else {
                version > min
            };
            if !ok {
                return false;
            }
        }
        if let Some(max) = &self.max {
            let ok = if self.max_inclusive {
                version <= max
            } else {
                version < max
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

fn parse_bound(token: &str) -> Result<Option<Version>, Error> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    parse_either(token).map(Some)
}
