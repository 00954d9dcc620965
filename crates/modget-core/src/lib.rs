#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::return_self_not_must_use)]

//! Core planning and installation for a NuGet v3-style module registry.
//!
//! The flow is `user specs → plan → on-disk modules`: [`resolve::build_plan`]
//! turns a set of module constraints into a deduplicated, dependency-closed
//! set of exact versions with download URIs, and [`install::install_plan`]
//! materialises that plan into a destination module tree.

pub mod config;
pub mod error;
pub mod install;
pub mod local;
pub mod paths;
pub mod progress;
pub mod range;
pub mod registration;
pub mod registry;
pub mod resolve;
pub mod spec;
pub mod version;

pub use config::InstallConfig;
pub use error::Error;
pub use install::{install_plan, InstalledModule};
pub use local::find_local;
pub use progress::{NoProgress, ProgressSink};
pub use range::VersionRange;
pub use registry::{Registry, RegistryClient, DEFAULT_SOURCE, SOURCE_ENV};
pub use resolve::{build_plan, build_plan_with, Plan};
pub use spec::{HostModuleSpec, ModuleSpec, RequestedModule, RequestedRecord};
pub use version::{parse_either, ClassicalVersion};
