//! Default reviewer resolution.
//!
//! Who has to sign a request off is a pure function of the action and the
//! current authorization graph: the devel maintainer when development moves,
//! the source maintainers when the creator cannot modify the source, and
//! everyone holding the reviewer role on the target. The resolver returns
//! the solicited parties in resolution order, first occurrence wins.

use slipway_core::backend::{AttributeKind, BuildService, PackageMeta, PackageRef, ProjectRef};
use slipway_core::identity::{ActorContext, Reviewer};

use crate::action::{ActionKind, RequestAction};
use crate::error::{RequestError, RequestResult};

/// Strip the incident suffix (the part after the last dot) from a released
/// package name.
fn stripped_release_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(base, _)| base)
}

async fn resolve_target_package<B: BuildService + ?Sized>(
    backend: &B,
    action: &RequestAction,
    target_project: &str,
) -> RequestResult<Option<PackageMeta>> {
    let looked_up = if let Some(target_package) = action.target_package() {
        if action.kind.is_maintenance_release() {
            // Released packages carry the incident suffix; reviews belong to
            // the original container. Branch target projects opt out of
            // project link following.
            let original = stripped_release_name(target_package);
            let follow = backend
                .find_attribute(target_project, None, AttributeKind::BranchTarget)
                .await?
                .is_none();
            backend
                .find_package(target_project, original, follow)
                .await?
        } else {
            let found = backend
                .find_package(target_project, target_package, false)
                .await?;
            let must_exist = matches!(
                action.kind,
                ActionKind::SetBugowner
                    | ActionKind::AddRole
                    | ActionKind::ChangeDevel
                    | ActionKind::Delete
            );
            if found.is_none() && must_exist {
                return Err(RequestError::UnknownTargetPackage(format!(
                    "{target_project}/{target_package}"
                )));
            }
            found
        }
    } else if let Some(source_package) = action.source_package() {
        // Project-scoped actions still review against the same-named target
        // container, when one exists.
        backend
            .find_package(target_project, source_package, false)
            .await?
    } else {
        None
    };

    Ok(match looked_up {
        Some(PackageRef::Local(meta)) => Some(meta),
        _ => None,
    })
}

/// Whether the source carries an approved-request-source exemption, on the
/// package itself or on its project.
async fn source_is_approved<B: BuildService + ?Sized>(
    backend: &B,
    project: &str,
    package: Option<&str>,
) -> RequestResult<bool> {
    if let Some(package) = package
        && backend
            .find_attribute(project, Some(package), AttributeKind::ApprovedRequestSource)
            .await?
            .is_some()
    {
        return Ok(true);
    }
    Ok(backend
        .find_attribute(project, None, AttributeKind::ApprovedRequestSource)
        .await?
        .is_some())
}

/// Resolve the reviews this action solicits by default.
///
/// Returns the reviewers in resolution order with duplicates removed.
///
/// # Errors
///
/// - [`RequestError::UnknownTargetProject`] when the named target is absent.
/// - [`RequestError::RemoteTargetUnsupported`] for targets on a federated
///   remote instance.
/// - [`RequestError::UnknownTargetPackage`] when a kind requiring an
///   existing target package names a missing one.
pub async fn default_reviewers<B: BuildService + ?Sized>(
    backend: &B,
    actor: &ActorContext,
    action: &RequestAction,
) -> RequestResult<Vec<Reviewer>> {
    let Some(target_project) = action.target_project() else {
        return Ok(Vec::new());
    };
    match backend.find_project(target_project).await? {
        Some(ProjectRef::Local(_)) => {},
        Some(ProjectRef::Remote(_)) => return Err(RequestError::RemoteTargetUnsupported),
        None => {
            return Err(RequestError::UnknownTargetProject(
                target_project.to_string(),
            ));
        },
    }

    let target_package = resolve_target_package(backend, action, target_project).await?;

    let mut reviews: Vec<Reviewer> = Vec::new();

    if let Some(source_project) = action.source_project() {
        // Moving development away needs the blessing of the current devel
        // maintainers, unless the actor is one of them.
        if action.kind == ActionKind::ChangeDevel
            && let Some(devel) = target_package.as_ref().and_then(|pkg| pkg.devel.clone())
            && let Some(devel_package) = devel.package.clone()
            && !backend
                .can_modify_package(&actor.login, &devel.project, &devel_package)
                .await?
        {
            reviews.push(Reviewer::package(devel.project, devel_package));
        }

        // Sources the actor cannot modify enforce a maintainer review, so
        // nobody submits versions without talking to the maintainers first.
        if !action.kind.is_maintenance_release() {
            if let Some(source_package) = action.source_package() {
                if matches!(
                    backend
                        .find_package(source_project, source_package, false)
                        .await?,
                    Some(PackageRef::Local(_))
                ) && !backend
                    .can_modify_package(&actor.login, source_project, source_package)
                    .await?
                    && !source_is_approved(backend, source_project, Some(source_package)).await?
                {
                    reviews.push(Reviewer::package(source_project, source_package));
                }
            } else if matches!(
                backend.find_project(source_project).await?,
                Some(ProjectRef::Local(_))
            ) && !backend
                .can_modify_project(&actor.login, source_project)
                .await?
                && !source_is_approved(backend, source_project, None).await?
            {
                reviews.push(Reviewer::project(source_project));
            }
        }
    }

    if let Some(package) = &target_package {
        reviews.extend(
            backend
                .reviewers_of(&package.project, Some(&package.name))
                .await?,
        );
    }
    reviews.extend(backend.reviewers_of(target_project, None).await?);

    let mut seen = std::collections::HashSet::new();
    Ok(reviews
        .into_iter()
        .filter(|reviewer| seen.insert(reviewer.clone()))
        .collect())
}
