//! Error types and results for the request engine.

use slipway_core::backend::BackendError;

/// Errors raised by the request-action engine.
///
/// All variants are domain-signaled failures, deterministic in the action
/// and current backend state. The engine never retries; readiness errors
/// (`BuildNotFinished` and friends) look transient but gate on logical
/// conditions the caller must resolve before re-submitting.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The action document is structurally broken or carries unknown fields.
    #[error("malformed action: {0}")]
    MalformedAction(String),

    /// The wire type name has no registered action kind.
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),

    /// The legacy `group` kind resolves for stored data but may not be
    /// constructed anew.
    #[error("request actions of type group can not be created anymore")]
    UnsupportedLegacyAction,

    /// Creating a request action with source options requires maintainership
    /// in the source package.
    #[error("lacking maintainership in source package")]
    LackingMaintainership,

    /// The target carries a reject-requests policy covering this action kind.
    #[error("request rejected: {0}")]
    RequestRejected(String),

    /// Direct submits to maintenance release projects are refused.
    #[error("submit request rejected: {0}")]
    SubmitRequestRejected(String),

    /// The named role does not resolve.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// The named user does not resolve.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The named group does not resolve.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// Incident actions must target maintenance projects.
    #[error("incident has no maintenance project: {0}")]
    IncidentHasNoMaintenanceProject(String),

    /// The action is structurally legal but semantically not permitted.
    #[error("illegal request: {0}")]
    IllegalRequest(String),

    /// The source project does not resolve.
    #[error("unknown project: {0}")]
    UnknownProject(String),

    /// The source package does not resolve.
    #[error("unknown source package: {0}")]
    UnknownSourcePackage(String),

    /// The target project does not resolve.
    #[error("unknown target project: {0}")]
    UnknownTargetProject(String),

    /// The target package does not resolve.
    #[error("unknown target package: {0}")]
    UnknownTargetPackage(String),

    /// The source link contradicts the declared release targets.
    #[error("wrong linked package source: {0}")]
    WrongLinkedPackageSource(String),

    /// Zero or multiple candidate release target projects.
    #[error("invalid release target: {0}")]
    InvalidReleaseTarget(String),

    /// The release is gated on unfinished or unpublished builds.
    #[error("build not finished: {0}")]
    BuildNotFinished(String),

    /// A maintenance release without any patchinfo would release no binaries.
    #[error("missing patchinfo: {0}")]
    MissingPatchinfo(String),

    /// Two publication records disagree on a version-release string.
    #[error("version release differs: {0}")]
    VersionReleaseDiffers(String),

    /// The operation is not supported for this source/target combination.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The diff collaborator failed; direct diff consumers see this error.
    #[error("diff computation failed: {0}")]
    DiffComputationFailed(#[source] BackendError),

    /// Auto-expansion from a remote instance is not supported; the caller
    /// must submit a fully specified request instead.
    #[error("no support for auto expanding from remote instance, submit a fully specified request")]
    RemoteSourceUnsupported,

    /// Targeting a remote project is not supported; create the request in
    /// the remote instance instead.
    #[error("no support for targeting remote projects, create the request in the remote instance")]
    RemoteTargetUnsupported,

    /// Cleanup of the source would break packages depending on it.
    #[error("has dependent packages: {0}")]
    HasDependentPackages(String),

    /// The source does not expand cleanly on the backend.
    #[error("expansion error: {0}")]
    ExpandError(String),

    /// The acting side may not read the source.
    #[error("source access rejected: {0}")]
    SourceAccessRejected(String),

    /// An ambient backend fault outside the diff path.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for engine operations.
pub type RequestResult<T> = Result<T, RequestError>;
