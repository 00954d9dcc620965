//! Module specifications.
//!
//! A [`ModuleSpec`] pairs a module identity (name plus optional guid) with
//! an inclusive version interval. User input arrives as bare names,
//! `Name@Version` strings, or host-shaped records; [`RequestedModule`]
//! normalises all three into specs. The resolver only ever emits *required*
//! specs (`min == max`) carrying a download URI.
//!
//! All version comparisons here use SemVer precedence, which ignores build
//! metadata; the classical-conversion markers live in build metadata and
//! must not influence matching.

use crate::error::Error;
use crate::range::VersionRange;
use crate::version::{self, folder_name, parse_either};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;
use uuid::Uuid;

/// A module identity plus version constraint.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    name: String,
    guid: Uuid,
    min: Version,
    max: Version,
    download_uri: Option<Url>,
}

impl ModuleSpec {
    /// A spec matching any version of `name`.
    #[must_use]
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: Uuid::nil(),
            min: version::min_version(),
            max: version::max_version(),
            download_uri: None,
        }
    }

    /// An exact-version spec.
    #[must_use]
    pub fn required(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            guid: Uuid::nil(),
            min: version.clone(),
            max: version,
            download_uri: None,
        }
    }

    /// A spec bounded by an inclusive interval.
    pub fn bounded(name: impl Into<String>, min: Version, max: Version) -> Result<Self, Error> {
        if min.cmp_precedence(&max) == Ordering::Greater {
            return Err(Error::invalid_argument(format!(
                "spec minimum {min} exceeds maximum {max}"
            )));
        }
        Ok(Self {
            name: name.into(),
            guid: Uuid::nil(),
            min,
            max,
            download_uri: None,
        })
    }

    /// Materialise a parsed range into a spec.
    ///
    /// Open bounds become the defined minimum/maximum; exclusive bounds are
    /// tightened into inclusive ones with the version boundary arithmetic.
    pub fn from_range(name: impl Into<String>, range: &VersionRange) -> Result<Self, Error> {
        let min = match &range.min {
            None => version::min_version(),
            Some(v) if range.min_inclusive => v.clone(),
            Some(v) => version::increment(v)?,
        };
        let max = match &range.max {
            None => version::max_version(),
            Some(v) if range.max_inclusive => v.clone(),
            Some(v) => version::decrement(v)?,
        };
        Self::bounded(name, min, max)
    }

    /// Attach a guid. Only required specs may carry a non-nil guid.
    pub fn with_guid(mut self, guid: Uuid) -> Result<Self, Error> {
        if !guid.is_nil() && !self.is_required() {
            return Err(Error::invalid_argument(format!(
                "a guid is only valid on an exact-version spec, got {self}"
            )));
        }
        self.guid = guid;
        Ok(self)
    }

    /// Attach the archive download URI of a resolved module.
    #[must_use]
    pub fn with_download_uri(mut self, uri: Url) -> Self {
        self.download_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn guid(&self) -> Uuid {
        self.guid
    }

    #[must_use]
    pub fn min(&self) -> &Version {
        &self.min
    }

    #[must_use]
    pub fn max(&self) -> &Version {
        &self.max
    }

    #[must_use]
    pub fn download_uri(&self) -> Option<&Url> {
        self.download_uri.as_ref()
    }

    /// Whether the spec pins exactly one version.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.min.cmp_precedence(&self.max) == Ordering::Equal
    }

    /// The pinned version of a required spec.
    #[must_use]
    pub fn required_version(&self) -> Option<&Version> {
        self.is_required().then_some(&self.min)
    }

    /// Whether the lower bound constrains anything.
    #[must_use]
    pub fn has_min(&self) -> bool {
        self.min.cmp_precedence(&version::min_version()) != Ordering::Equal
    }

    /// Whether the upper bound constrains anything.
    #[must_use]
    pub fn has_max(&self) -> bool {
        self.max.cmp_precedence(&version::max_version()) != Ordering::Equal
    }

    /// `min <= v <= max` under SemVer precedence.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.min.cmp_precedence(version) != Ordering::Greater
            && version.cmp_precedence(&self.max) != Ordering::Greater
    }

    /// Containment: `other`'s interval lies inside this spec's interval
    /// and the identities agree.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.name == other.name
            && self.guid == other.guid
            && self.min.cmp_precedence(&other.min) != Ordering::Greater
            && other.max.cmp_precedence(&self.max) != Ordering::Greater
    }

    /// Whether two same-identity specs have intersecting interiors.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.name == other.name
            && self.guid == other.guid
            && self.min.cmp_precedence(&other.max) == Ordering::Less
            && self.max.cmp_precedence(&other.min) == Ordering::Greater
    }

    /// Trichotomic comparison against a bare version: `Equal` when the
    /// version lies inside the interval, `Greater` when the spec demands
    /// something newer, `Less` when it demands something older.
    #[must_use]
    pub fn cmp_version(&self, version: &Version) -> Ordering {
        if version.cmp_precedence(&self.min) == Ordering::Less {
            Ordering::Greater
        } else if version.cmp_precedence(&self.max) == Ordering::Greater {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    /// The canonical string form:
    /// `Name[guid?]{@required | <max | >min | :min-max}`.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = self.name.clone();
        if !self.guid.is_nil() {
            out.push('[');
            out.push_str(&self.guid.to_string());
            out.push(']');
        }
        if self.is_required() {
            out.push('@');
            out.push_str(&folder_name(&self.min));
        } else {
            match (self.has_min(), self.has_max()) {
                (false, false) => {}
                (false, true) => {
                    out.push('<');
                    out.push_str(&folder_name(&self.max));
                }
                (true, false) => {
                    out.push('>');
                    out.push_str(&folder_name(&self.min));
                }
                (true, true) => {
                    out.push(':');
                    out.push_str(&folder_name(&self.min));
                    out.push('-');
                    out.push_str(&folder_name(&self.max));
                }
            }
        }
        out
    }

    /// Project onto the host package-manager specification shape.
    #[must_use]
    pub fn to_host_spec(&self) -> HostModuleSpec {
        let guid = (!self.guid.is_nil()).then_some(self.guid);
        if self.is_required() {
            return HostModuleSpec {
                name: self.name.clone(),
                required_version: Some(folder_name(&self.min)),
                version: None,
                maximum_version: None,
                guid,
            };
        }
        HostModuleSpec {
            name: self.name.clone(),
            required_version: None,
            // A fully open spec still pins the floor so the host shape is
            // well-formed.
            version: Some(if self.has_min() {
                folder_name(&self.min)
            } else {
                "0.0.0".to_string()
            }),
            maximum_version: self.has_max().then(|| folder_name(&self.max)),
            guid,
        }
    }

    /// Parse a user spec string: a bare module name, or `Name@Version`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::invalid_argument("empty module spec"));
        }
        match input.split_once('@') {
            None => {
                validate_name(input)?;
                Ok(Self::any(input))
            }
            Some((name, version)) => {
                validate_name(name)?;
                if version.is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "empty version in module spec '{input}'"
                    )));
                }
                Ok(Self::required(name, parse_either(version)?))
            }
        }
    }
}

impl PartialEq for ModuleSpec {
    fn eq(&self, other: &Self) -> bool {
        // Download URI is an attribute of a resolution, not of the
        // identity+constraint tuple; plan membership ignores it.
        self.name == other.name
            && self.guid == other.guid
            && self.min == other.min
            && self.max == other.max
    }
}

impl Eq for ModuleSpec {}

impl Hash for ModuleSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid_argument("empty module name"));
    }
    for c in name.chars() {
        if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(Error::invalid_argument(format!(
                "invalid character '{c}' in module name '{name}'"
            )));
        }
    }
    Ok(())
}

/// The host package-manager module-specification shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostModuleSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
}

/// A module request as the user hands it over: a string or a record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestedModule {
    Name(String),
    Record(RequestedRecord),
}

/// The record form of a module request, host-shaped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestedRecord {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub maximum_version: Option<String>,
    #[serde(default)]
    pub required_version: Option<String>,
    #[serde(default)]
    pub guid: Option<Uuid>,
}

impl RequestedModule {
    /// Normalise the request into a [`ModuleSpec`].
    pub fn normalize(&self) -> Result<ModuleSpec, Error> {
        match self {
            Self::Name(s) => ModuleSpec::parse(s),
            Self::Record(record) => record.normalize(),
        }
    }
}

impl RequestedRecord {
    fn normalize(&self) -> Result<ModuleSpec, Error> {
        validate_name(&self.name)?;
        let guid = self.guid.unwrap_or_else(Uuid::nil);

        if let Some(required) = &self.required_version {
            if self.version.is_some() || self.maximum_version.is_some() {
                return Err(Error::invalid_argument(format!(
                    "module '{}' mixes RequiredVersion with a version range",
                    self.name
                )));
            }
            return ModuleSpec::required(&self.name, parse_either(required)?).with_guid(guid);
        }

        let min = match &self.version {
            Some(v) => parse_either(v)?,
            None => version::min_version(),
        };
        let max = match &self.maximum_version {
            Some(v) => parse_either(v)?,
            None => version::max_version(),
        };
        ModuleSpec::bounded(&self.name, min, max)?.with_guid(guid)
    }
}
