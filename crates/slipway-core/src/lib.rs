//! Slipway Core - Foundation types for the slipway request engine.
//!
//! This crate provides:
//! - The naming grammar for project and package names
//! - Source/target endpoints and direction-free accessors
//! - Identities: acting users, reviewers
//! - The [`BuildService`](backend::BuildService) trait, the engine's only
//!   window onto the backend build service

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![warn(unreachable_pub)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod backend;
pub mod endpoint;
pub mod identity;
pub mod name;

pub use backend::{
    Attribute, AttributeKind, BackendError, BuildResult, BuildService, BuildState, DirectoryMeta,
    HistoryEntry, LinkInfo, PackageBuildStatus, PackageMeta, PackageRef, ProjectKind, ProjectMeta,
    ProjectRef, ReleaseTarget, ReleaseTrigger, Repository,
};
pub use endpoint::{Direction, Endpoint};
pub use identity::{ActorContext, Reviewer};
pub use name::{valid_package_name, valid_project_name};
