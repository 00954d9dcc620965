//! Error types for the planner and installer.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for modget operations.
///
/// Variants that originate while working on a particular module carry the
/// canonical form of the triggering spec so callers can report which
/// requirement failed. Nothing here is retried internally; every error is
/// surfaced to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// The registry returned 404 for a module's registration index.
    #[error("module not found in registry: {name}")]
    NotFound { name: String },

    /// The registry has the module, but no published version satisfies
    /// the constraint.
    #[error("no version satisfying {spec} was found in the registry")]
    NoSatisfyingVersion { spec: String },

    /// The registry answered with a document we cannot use.
    #[error("invalid registry response for {name}: {reason}")]
    InvalidRegistryResponse { name: String, reason: String },

    /// HTTP/TLS/socket failure, wrapped with the spec that triggered it.
    #[error("transport error while fetching {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// A local module directory exists but its manifest is missing.
    #[error("local module at {path} is corrupt: manifest missing")]
    CorruptLocalModule { path: PathBuf },

    /// An archive could not be unpacked into the destination tree.
    #[error("failed to extract archive for {spec}: {reason}")]
    Extract { spec: String, reason: String },

    /// Unparseable version, range, or module spec at the boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The run's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_response(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRegistryResponse {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
