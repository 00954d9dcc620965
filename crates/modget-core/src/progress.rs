//! Progress reporting seam.
//!
//! The planner and installer report lifecycle events through this trait so
//! the calling surface (CLI, host integration) can render them; the core
//! never prints.

use crate::spec::ModuleSpec;

/// Receiver for planner/installer lifecycle events.
///
/// All methods have no-op defaults; implement what the surface cares about.
pub trait ProgressSink: Send + Sync {
    /// An index fetch for `name` was enqueued.
    fn resolving(&self, _name: &str) {}

    /// A module version was selected and added to the plan.
    fn resolved(&self, _spec: &ModuleSpec) {}

    /// A module archive finished downloading (or was reused from cache).
    fn downloaded(&self, _spec: &ModuleSpec, _from_cache: bool) {}

    /// A module finished extracting into the destination tree.
    fn extracted(&self, _spec: &ModuleSpec) {}
}

/// A sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
