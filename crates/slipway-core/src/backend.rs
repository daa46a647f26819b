//! The backend build service, seen through the engine's eyes.
//!
//! [`BuildService`] is the engine's only window onto backend state: package
//! metadata, link info, build and publication status, diffs, and the
//! authorization predicates. The engine treats every answer as a read-only
//! snapshot taken at query time; it never caches across calls and never
//! retries. Transient transport faults surface as [`BackendError`] and are
//! the caller's problem.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::endpoint::Endpoint;
use crate::identity::Reviewer;

/// A failure talking to or resolving state on the backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The backend did not answer within the caller's deadline.
    #[error("backend timeout after {seconds}s: {context}")]
    Timeout {
        /// Deadline that elapsed, in seconds.
        seconds: u64,
        /// What was being asked.
        context: String,
    },
    /// The transport to the backend failed.
    #[error("backend call failed: {0}")]
    Transport(String),
}

impl BackendError {
    /// A transport failure with the given description.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// What a project is for, as declared in its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    /// A plain development or distribution project.
    Standard,
    /// The coordination project of a maintenance team.
    Maintenance,
    /// An incident project bundling fixes destined for release.
    MaintenanceIncident,
    /// A released, maintained code stream. Accepts only the maintenance
    /// workflow, never direct submits.
    MaintenanceRelease,
}

/// When a release target fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseTrigger {
    /// Released explicitly by an operator.
    Manual,
    /// Released by accepting a maintenance release request.
    Maintenance,
}

/// A declared repository-to-repository release relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTarget {
    /// Project the release publishes into.
    pub target_project: String,
    /// Repository within the target project.
    pub target_repository: String,
    /// What causes the release to fire.
    pub trigger: ReleaseTrigger,
}

/// One repository of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository name.
    pub name: String,
    /// Build architectures, in scheduler order.
    pub architectures: Vec<String>,
    /// Release targets declared on this repository.
    pub release_targets: Vec<ReleaseTarget>,
}

/// Metadata of a local project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// Project name.
    pub name: String,
    /// Declared project kind.
    pub kind: ProjectKind,
    /// The project's repositories.
    pub repositories: Vec<Repository>,
}

impl ProjectMeta {
    /// Whether this is a maintenance incident project.
    #[must_use]
    pub fn is_maintenance_incident(&self) -> bool {
        self.kind == ProjectKind::MaintenanceIncident
    }

    /// Whether this is a maintenance release project.
    #[must_use]
    pub fn is_maintenance_release(&self) -> bool {
        self.kind == ProjectKind::MaintenanceRelease
    }

    /// All release targets of this project's repositories with the given trigger.
    pub fn release_targets_with(&self, trigger: ReleaseTrigger) -> impl Iterator<Item = &ReleaseTarget> {
        self.repositories
            .iter()
            .flat_map(|repo| repo.release_targets.iter())
            .filter(move |rt| rt.trigger == trigger)
    }

    /// Whether any repository declares a release target into `project`.
    #[must_use]
    pub fn releases_into(&self, project: &str) -> bool {
        self.repositories
            .iter()
            .flat_map(|repo| repo.release_targets.iter())
            .any(|rt| rt.target_project == project)
    }

    /// Whether any repository declares a maintenance-triggered release
    /// target into `project`.
    #[must_use]
    pub fn maintenance_releases_into(&self, project: &str) -> bool {
        self.release_targets_with(ReleaseTrigger::Maintenance)
            .any(|rt| rt.target_project == project)
    }
}

/// A resolved project: local metadata, or a reference into a federated
/// remote instance the engine cannot inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// A project on this instance.
    Local(ProjectMeta),
    /// A project living on a remote instance, by name.
    Remote(String),
}

impl ProjectRef {
    /// The project name, wherever it lives.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Local(meta) => &meta.name,
            Self::Remote(name) => name,
        }
    }

    /// Local metadata, if this is a local project.
    #[must_use]
    pub fn as_local(&self) -> Option<&ProjectMeta> {
        match self {
            Self::Local(meta) => Some(meta),
            Self::Remote(_) => None,
        }
    }
}

/// Metadata of a local package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMeta {
    /// Owning project.
    pub project: String,
    /// Package name.
    pub name: String,
    /// Declared name the package releases under, if any.
    pub release_name: Option<String>,
    /// The devel package currently owning development, if declared.
    pub devel: Option<Endpoint>,
    /// Whether this is a patchinfo container.
    pub patchinfo: bool,
    /// Whether this is a channel container.
    pub channel: bool,
}

impl PackageMeta {
    /// A plain package in `project` named `name`.
    #[must_use]
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            release_name: None,
            devel: None,
            patchinfo: false,
            channel: false,
        }
    }
}

/// A resolved package: local metadata, or a remote reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRef {
    /// A package on this instance.
    Local(PackageMeta),
    /// A package living on a remote instance.
    Remote(Endpoint),
}

/// A package's source link declaration, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    /// Project the link points into; absent for links within the same project.
    pub project: Option<String>,
    /// Package the link points at.
    pub package: String,
    /// Whether the link target is allowed to be missing.
    pub missing_ok: bool,
}

/// A package source directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMeta {
    /// Source checksum of the listed revision.
    pub srcmd5: String,
    /// File names in the directory.
    pub entries: Vec<String>,
    /// Link declaration, if the package is a link.
    pub link: Option<LinkInfo>,
}

/// Aggregate build state of one repository/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Building or waiting to build.
    Building,
    /// Scheduler is calculating.
    Scheduling,
    /// Blocked on dependencies.
    Blocked,
    /// Built, publish not yet started.
    Finished,
    /// Publish in progress.
    Publishing,
    /// Built and published.
    Published,
    /// Built, publishing disabled.
    Unpublished,
}

/// Build status of one package within a repository/architecture result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageBuildStatus {
    /// Package name.
    pub package: String,
    /// Status code as reported by the scheduler (`succeeded`, `excluded`,
    /// `broken`, ...). Open-ended, so kept verbatim.
    pub code: String,
    /// Version-release string of the built binaries, when available.
    pub versrel: Option<String>,
}

/// Build/publication result of one repository/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Repository name.
    pub repository: String,
    /// Architecture name.
    pub arch: String,
    /// Aggregate state.
    pub state: BuildState,
    /// Whether the scheduler still needs to recalculate this pair.
    pub dirty: bool,
    /// Per-package statuses.
    pub statuses: Vec<PackageBuildStatus>,
}

/// One entry of a package's binary publication history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Source checksum the binaries were built from.
    pub srcmd5: String,
}

/// Policy attributes the engine consults on projects and packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Requests against this object are rejected, with a stated reason.
    RejectRequests,
    /// Sources from here are exempt from the mandatory maintainer review.
    ApprovedRequestSource,
    /// Submits into this project must keep origin versions monotonic.
    MakeOriginOlder,
    /// This project is a branch target; do not follow project links when
    /// resolving release package names.
    BranchTarget,
    /// Redirects lookups to the project's update instance.
    UpdateProject,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RejectRequests => "RejectRequests",
            Self::ApprovedRequestSource => "ApprovedRequestSource",
            Self::MakeOriginOlder => "MakeOriginOlder",
            Self::BranchTarget => "BranchTarget",
            Self::UpdateProject => "UpdateProject",
        };
        write!(f, "{name}")
    }
}

/// A policy attribute instance with its value list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute values. For [`AttributeKind::RejectRequests`] the first
    /// value is the stated reason and any further values name the action
    /// kinds the rejection is limited to.
    pub values: Vec<String>,
}

/// Backend query capabilities consumed by the request engine.
///
/// Implementations wrap the build service API. Every method is a synchronous
/// question about current backend state; the engine issues them sequentially
/// and treats each answer as a point-in-time snapshot.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Resolve a project by name, distinguishing local from remote projects.
    async fn find_project(&self, name: &str) -> Result<Option<ProjectRef>, BackendError>;

    /// Resolve a package by name, optionally following project links.
    async fn find_package(
        &self,
        project: &str,
        package: &str,
        follow_project_links: bool,
    ) -> Result<Option<PackageRef>, BackendError>;

    /// Whether a package container exists, optionally following project links.
    async fn package_exists(
        &self,
        project: &str,
        package: &str,
        follow_project_links: bool,
    ) -> Result<bool, BackendError>;

    /// All packages of a project, in backend order.
    async fn packages_of(&self, project: &str) -> Result<Vec<PackageRef>, BackendError>;

    /// Source directory listing of a package, optionally link-expanded
    /// and/or pinned to a revision.
    async fn package_directory(
        &self,
        project: &str,
        package: &str,
        expand: bool,
        rev: Option<&str>,
    ) -> Result<DirectoryMeta, BackendError>;

    /// Look up a policy attribute on a project, or on a package within it.
    async fn find_attribute(
        &self,
        project: &str,
        package: Option<&str>,
        kind: AttributeKind,
    ) -> Result<Option<Attribute>, BackendError>;

    /// Build/publication results of every repository/architecture pair of a
    /// project, including per-package version-release data.
    async fn version_releases(&self, project: &str) -> Result<Vec<BuildResult>, BackendError>;

    /// Published binary file names of a package in one repository/arch.
    async fn published_binaries(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Vec<String>, BackendError>;

    /// Build-result history of a package in one repository/arch, oldest first.
    async fn binary_history(
        &self,
        project: &str,
        repository: &str,
        package: &str,
        arch: &str,
    ) -> Result<Vec<HistoryEntry>, BackendError>;

    /// Release-target project names declared inside a patchinfo container.
    /// Empty when the patchinfo does not restrict its targets.
    async fn patchinfo_release_targets(
        &self,
        project: &str,
        package: &str,
    ) -> Result<Vec<String>, BackendError>;

    /// Content diff between a source endpoint (at an optional revision) and
    /// a target endpoint.
    async fn source_diff(
        &self,
        source: &Endpoint,
        rev: Option<&str>,
        target: &Endpoint,
    ) -> Result<String, BackendError>;

    /// Whether a user with this login exists.
    async fn user_exists(&self, login: &str) -> Result<bool, BackendError>;

    /// Whether a group with this title exists.
    async fn group_exists(&self, title: &str) -> Result<bool, BackendError>;

    /// Whether a role with this title exists.
    async fn role_exists(&self, title: &str) -> Result<bool, BackendError>;

    /// Whether the user may modify the project.
    async fn can_modify_project(&self, login: &str, project: &str)
        -> Result<bool, BackendError>;

    /// Whether the user may modify the package.
    async fn can_modify_package(
        &self,
        login: &str,
        project: &str,
        package: &str,
    ) -> Result<bool, BackendError>;

    /// Check whether deleting the package would break dependent packages.
    /// Returns a description of the conflict, if any.
    async fn weak_dependency_conflict(
        &self,
        project: &str,
        package: &str,
    ) -> Result<Option<String>, BackendError>;

    /// Direct holders of the designated reviewer role on a project, or on a
    /// package within it.
    async fn reviewers_of(
        &self,
        project: &str,
        package: Option<&str>,
    ) -> Result<Vec<Reviewer>, BackendError>;

    /// Whether the sources of the package may be read by request machinery.
    async fn source_readable(&self, project: &str, package: &str)
        -> Result<bool, BackendError>;
}
