//! Convenience re-exports of the types most callers need.

pub use crate::backend::{
    Attribute, AttributeKind, BackendError, BuildResult, BuildService, BuildState, DirectoryMeta,
    HistoryEntry, LinkInfo, PackageBuildStatus, PackageMeta, PackageRef, ProjectKind, ProjectMeta,
    ProjectRef, ReleaseTarget, ReleaseTrigger, Repository,
};
pub use crate::endpoint::{Direction, Endpoint};
pub use crate::identity::{ActorContext, Reviewer};
pub use crate::name::{valid_package_name, valid_project_name};
