//! Authorization checks against source and target.
//!
//! Two entry points mirror the two sides of an action:
//! [`check_source_permission`] answers "may this source feed a request at
//! all", [`check_target_permission`] answers "does the target accept it".
//! [`check_full_permission`] orchestrates both plus the kind-specific
//! legality rules and is the call sites' usual entry.
//!
//! Every failure here is a deterministic function of the action and the
//! current authorization graph; nothing is retried.

use slipway_core::backend::{Attribute, AttributeKind, BuildService, ProjectKind, ProjectRef};
use slipway_core::identity::ActorContext;

use crate::action::{ActionKind, RequestAction, SourceUpdatePolicy};
use crate::error::{RequestError, RequestResult};

/// Check that the action's source exists and the actor may use it as
/// declared.
///
/// Returns the resolved source project for the caller's follow-up checks,
/// or `None` when the action declares no source.
///
/// # Errors
///
/// - [`RequestError::UnknownProject`] when the source project is absent.
/// - [`RequestError::NotSupported`] for remote sources outside the
///   local-source-tolerant kinds.
/// - [`RequestError::HasDependentPackages`] when a `cleanup` policy would
///   break packages depending on the source.
/// - [`RequestError::LackingMaintainership`] when source options are set
///   without modify rights on the source.
pub async fn check_source_permission<B: BuildService + ?Sized>(
    backend: &B,
    actor: &ActorContext,
    action: &RequestAction,
) -> RequestResult<Option<ProjectRef>> {
    let Some(source) = &action.source else {
        return Ok(None);
    };

    let project = backend
        .find_project(&source.project)
        .await?
        .ok_or_else(|| {
            RequestError::UnknownProject(format!("unknown source project {}", source.project))
        })?;

    if matches!(project, ProjectRef::Remote(_)) && !action.kind.tolerates_remote_source() {
        return Err(RequestError::NotSupported(format!(
            "source project {} is not a local project, this is not supported yet",
            source.project
        )));
    }

    if let Some(package) = &source.package
        && action.source_update == Some(SourceUpdatePolicy::Cleanup)
        && backend
            .find_package(&source.project, package, true)
            .await?
            .is_some()
        && let Some(conflict) = backend
            .weak_dependency_conflict(&source.project, package)
            .await?
    {
        return Err(RequestError::HasDependentPackages(conflict));
    }

    check_permissions_for_sources(backend, actor, action, &project).await?;

    Ok(Some(project))
}

/// Source options require maintainership on the source package or project.
async fn check_permissions_for_sources<B: BuildService + ?Sized>(
    backend: &B,
    actor: &ActorContext,
    action: &RequestAction,
    project: &ProjectRef,
) -> RequestResult<()> {
    let mutates = action
        .source_update
        .is_some_and(SourceUpdatePolicy::mutates_source)
        || action.update_link;
    if !mutates {
        return Ok(());
    }
    // Remote source objects cannot be permission-checked here.
    let ProjectRef::Local(meta) = project else {
        return Ok(());
    };

    let allowed = if let Some(package) = action.source_package()
        && backend
            .find_package(&meta.name, package, true)
            .await?
            .is_some()
    {
        backend
            .can_modify_package(&actor.login, &meta.name, package)
            .await?
    } else {
        backend.can_modify_project(&actor.login, &meta.name).await?
    };
    if allowed {
        Ok(())
    } else {
        Err(RequestError::LackingMaintainership)
    }
}

/// Extract the rejection reason when a reject-requests policy attribute
/// covers this action kind.
///
/// The first value is the stated reason; further values name the kinds the
/// rejection is limited to. Without a kind list the rejection covers all.
fn rejected_reason(attribute: &Attribute, kind: ActionKind) -> Option<&str> {
    let reason = attribute.values.first()?;
    let kinds = attribute.values.get(1..).unwrap_or_default();
    if kinds.is_empty() || kinds.iter().any(|k| k == kind.wire_name()) {
        Some(reason)
    } else {
        None
    }
}

/// Check that the action's target accepts requests of this kind.
///
/// Returns the resolved target project, or `None` when no target project is
/// declared.
///
/// # Errors
///
/// - [`RequestError::UnknownTargetProject`] when the named target is absent.
/// - [`RequestError::SubmitRequestRejected`] for direct submits into
///   maintenance release projects.
/// - [`RequestError::RequestRejected`] when a reject-requests policy on the
///   target project or package covers this kind.
/// - [`RequestError::UnknownTargetPackage`] when a kind requiring an
///   existing target package names a missing one.
pub async fn check_target_permission<B: BuildService + ?Sized>(
    backend: &B,
    action: &RequestAction,
) -> RequestResult<Option<ProjectRef>> {
    let Some(target_project) = action.target_project().filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let project = backend
        .find_project(target_project)
        .await?
        .ok_or_else(|| RequestError::UnknownTargetProject(target_project.to_string()))?;

    if let ProjectRef::Local(meta) = &project {
        if meta.is_maintenance_release() && action.kind.is_submit() {
            return Err(RequestError::SubmitRequestRejected(format!(
                "the target project {target_project} is a maintenance release project, \
                 please use the maintenance workflow instead"
            )));
        }
        if let Some(attribute) = backend
            .find_attribute(target_project, None, AttributeKind::RejectRequests)
            .await?
            && let Some(reason) = rejected_reason(&attribute, action.kind)
        {
            return Err(RequestError::RequestRejected(format!(
                "the target project {target_project} is not accepting requests because: {reason}"
            )));
        }
    }

    if let Some(target_package) = action.target_package() {
        let must_exist = matches!(
            action.kind,
            ActionKind::Delete | ActionKind::ChangeDevel | ActionKind::AddRole | ActionKind::SetBugowner
        );
        let exists = backend
            .package_exists(target_project, target_package, true)
            .await?;
        if exists {
            if let Some(attribute) = backend
                .find_attribute(
                    target_project,
                    Some(target_package),
                    AttributeKind::RejectRequests,
                )
                .await?
                && let Some(reason) = rejected_reason(&attribute, action.kind)
            {
                return Err(RequestError::RequestRejected(format!(
                    "the target package {target_project}/{target_package} is not accepting \
                     requests because: {reason}"
                )));
            }
        } else if must_exist {
            return Err(RequestError::UnknownTargetPackage(format!(
                "{target_project}/{target_package}"
            )));
        }
    }

    Ok(Some(project))
}

/// Full per-action permission check: source feasibility, target acceptance
/// and the kind-specific legality rules.
///
/// May adjust the action: the implicit-branch `cleanup` default and the
/// opportunistic `make_origin_older` flag are written back here.
///
/// # Errors
///
/// Everything the two partial checks raise, plus
/// [`RequestError::UnknownUser`]/[`RequestError::UnknownGroup`]/
/// [`RequestError::UnknownRole`] for unresolvable parties,
/// [`RequestError::IllegalRequest`] for incident actions with package
/// targets, and [`RequestError::IncidentHasNoMaintenanceProject`] for
/// incident targets outside the maintenance project kinds.
pub async fn check_full_permission<B: BuildService + ?Sized>(
    backend: &B,
    actor: &ActorContext,
    action: &mut RequestAction,
    skip_source: bool,
) -> RequestResult<()> {
    if let Some(person) = &action.person
        && !backend.user_exists(person).await?
    {
        return Err(RequestError::UnknownUser(person.clone()));
    }
    if let Some(group) = &action.group
        && !backend.group_exists(group).await?
    {
        return Err(RequestError::UnknownGroup(group.clone()));
    }
    if let Some(role) = &action.role
        && !backend.role_exists(role).await?
    {
        return Err(RequestError::UnknownRole(role.clone()));
    }

    let source_project = if skip_source {
        None
    } else {
        check_source_permission(backend, actor, action).await?
    };
    let target_project = check_target_permission(backend, action).await?;

    match action.kind {
        ActionKind::Delete | ActionKind::AddRole | ActionKind::SetBugowner => {
            if target_project.is_none() {
                return Err(RequestError::UnknownProject(
                    "no target project specified".to_string(),
                ));
            }
            if action.kind == ActionKind::AddRole && action.role.is_none() {
                return Err(RequestError::UnknownRole("no role specified".to_string()));
            }
        },
        ActionKind::Submit
        | ActionKind::ChangeDevel
        | ActionKind::MaintenanceRelease
        | ActionKind::MaintenanceIncident => {
            if source_project.is_none() && !skip_source {
                return Err(RequestError::UnknownProject(
                    "no source project specified".to_string(),
                ));
            }

            if action.kind.is_maintenance_incident() {
                if action.target_package().is_some() {
                    return Err(RequestError::IllegalRequest(
                        "maintenance requests accept only projects as target".to_string(),
                    ));
                }
                let Some(project) = &target_project else {
                    return Err(RequestError::IllegalRequest(
                        "a target project must have been resolved before".to_string(),
                    ));
                };
                let is_maintenance = project.as_local().is_some_and(|meta| {
                    matches!(
                        meta.kind,
                        ProjectKind::Maintenance | ProjectKind::MaintenanceIncident
                    )
                });
                if !is_maintenance {
                    return Err(RequestError::IncidentHasNoMaintenanceProject(
                        "incident projects shall only create below maintenance projects"
                            .to_string(),
                    ));
                }
            }

            // Cleanup implicit home branches.
            if matches!(
                action.kind,
                ActionKind::Submit | ActionKind::MaintenanceIncident
            ) && action.source_update.is_none()
                && let (Some(source), Some(target)) =
                    (action.source_project(), action.target_project())
                && actor.branch_project_name(target) == source
            {
                action.source_update = Some(SourceUpdatePolicy::Cleanup);
            }

            if action.kind.is_submit()
                && let Some(ProjectRef::Local(meta)) = &target_project
                && backend
                    .find_attribute(&meta.name, None, AttributeKind::MakeOriginOlder)
                    .await?
                    .is_some()
            {
                action.make_origin_older = true;
            }

            if action.source_update == Some(SourceUpdatePolicy::Cleanup)
                && matches!(source_project, Some(ProjectRef::Remote(_)))
                && !skip_source
            {
                return Err(RequestError::NotSupported(format!(
                    "source project {} is not a local project, cleanup is not supported",
                    action.source_project().unwrap_or_default()
                )));
            }

            if action.kind == ActionKind::ChangeDevel && action.target_package().is_none() {
                return Err(RequestError::UnknownTargetPackage(
                    "no target package specified".to_string(),
                ));
            }
        },
        ActionKind::Group => {},
    }

    Ok(())
}

/// Verify the acting side may read the source at all.
///
/// A source hidden from the actor is tolerated only when the actor can
/// modify the target project: the request creator (who could read the
/// source) then deliberately asked the target owners for review.
///
/// # Errors
///
/// [`RequestError::SourceAccessRejected`] when the source is unreadable and
/// the target escape hatch does not apply.
pub async fn check_source_access<B: BuildService + ?Sized>(
    backend: &B,
    actor: &ActorContext,
    action: &RequestAction,
) -> RequestResult<()> {
    let (Some(project), Some(package)) = (action.source_project(), action.source_package()) else {
        return Ok(());
    };
    if backend.source_readable(project, package).await? {
        return Ok(());
    }
    if let Some(target) = action.target_project()
        && matches!(
            backend.find_project(target).await?,
            Some(ProjectRef::Local(_))
        )
        && backend.can_modify_project(&actor.login, target).await?
    {
        return Ok(());
    }
    Err(RequestError::SourceAccessRejected(format!(
        "{project}/{package}"
    )))
}
