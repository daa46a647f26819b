//! Source expansion: turning declared actions into concrete per-package ones.
//!
//! A project-scoped or link-routed action is a declaration, not an
//! executable plan. The expander resolves source links, derives one concrete
//! action per affected package from the immutable template, enforces the
//! release readiness gates and drops legs that would change nothing. The
//! template itself is never mutated during derivation; only the explicit
//! release-project rewrite touches the original action.

use std::collections::{HashMap, HashSet};

use slipway_core::backend::{
    AttributeKind, BuildResult, BuildService, BuildState, LinkInfo, PackageMeta, PackageRef,
    ProjectMeta, ProjectRef, ReleaseTrigger,
};

use crate::action::{ActionKind, DerivePatch, RequestAction, SourceRef, TargetRef};
use crate::diff::contains_change;
use crate::error::{RequestError, RequestResult};

/// Upper bound on local link hops. Backend link chains are short; anything
/// beyond this is a cycle.
const MAX_LINK_DEPTH: usize = 16;

/// Knobs for one expansion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions {
    /// Skip the build/publication readiness gates. Used when re-expanding
    /// stored requests whose binaries may have moved on.
    pub ignore_build_state: bool,
}

/// The outcome of expanding one template action.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// The concrete actions replacing the template. Empty means the template
    /// describes no change at all and the whole action can be dropped.
    pub actions: Vec<RequestAction>,
    /// Whether acceptance may lock per package instead of per project.
    pub per_package_locking: bool,
}

/// Follow a project's update-instance redirection, if declared.
async fn update_instance<B: BuildService + ?Sized>(
    backend: &B,
    project: &str,
) -> RequestResult<String> {
    if let Some(attribute) = backend
        .find_attribute(project, None, AttributeKind::UpdateProject)
        .await?
        && let Some(name) = attribute.values.first()
    {
        return Ok(name.clone());
    }
    Ok(project.to_string())
}

async fn local_project_meta<B: BuildService + ?Sized>(
    backend: &B,
    name: &str,
) -> RequestResult<ProjectMeta> {
    match backend.find_project(name).await? {
        Some(ProjectRef::Local(meta)) => Ok(meta),
        Some(ProjectRef::Remote(_)) => Err(RequestError::RemoteSourceUnsupported),
        None => Err(RequestError::UnknownProject(name.to_string())),
    }
}

/// Expand the template action into its concrete per-package actions.
///
/// Returns `None` when the action needs no expansion and stands as declared,
/// or the replacement set otherwise. An empty replacement set means the
/// action is a no-op against current target state.
///
/// The only mutation of the template is the incident release-project
/// rewrite through the update instance.
///
/// # Errors
///
/// The full readiness and routing taxonomy: [`RequestError::BuildNotFinished`],
/// [`RequestError::VersionReleaseDiffers`], [`RequestError::MissingPatchinfo`],
/// [`RequestError::InvalidReleaseTarget`], [`RequestError::WrongLinkedPackageSource`],
/// [`RequestError::UnknownTargetProject`] and the source resolution errors.
pub async fn expand_targets<B: BuildService + ?Sized>(
    backend: &B,
    action: &mut RequestAction,
    options: ExpandOptions,
) -> RequestResult<Option<Expansion>> {
    if !action.kind.expandable() {
        return Ok(None);
    }

    // A fully specified action against an existing target container either
    // stands as declared or describes no change at all.
    if matches!(
        action.kind,
        ActionKind::Submit | ActionKind::MaintenanceIncident
    ) && let (Some(project), Some(package)) = (action.target_project(), action.target_package())
        && backend.package_exists(project, package, false).await?
    {
        if contains_change(backend, action).await {
            return Ok(None);
        }
        return Ok(Some(Expansion::default()));
    }

    if action.target_package().is_some()
        && matches!(
            action.kind,
            ActionKind::Submit | ActionKind::MaintenanceRelease
        )
    {
        return Ok(None);
    }

    // Incident legs carrying an explicit release project only need the
    // update-instance rewrite, not a package fan-out.
    if action.kind.is_maintenance_incident()
        && let Some(declared) = action
            .target
            .as_ref()
            .and_then(|t| t.release_project.clone())
        && let Some(source_package) = action.source_package().map(ToOwned::to_owned)
    {
        let source_project = action.source_project().unwrap_or_default().to_string();
        let package = match backend
            .find_package(&source_project, &source_package, true)
            .await?
        {
            Some(PackageRef::Local(meta)) => Some(meta),
            Some(PackageRef::Remote(_)) => None,
            None => {
                return Err(RequestError::UnknownSourcePackage(format!(
                    "{source_project}/{source_package}"
                )));
            },
        };
        let resolved = update_instance(backend, &declared).await?;
        if backend.find_project(&resolved).await?.is_none() {
            return Err(RequestError::UnknownProject(resolved));
        }
        if let Some(target) = &mut action.target {
            target.release_project = Some(resolved);
        }
        if let Some(package) = &package {
            release_project_for(backend, action, package, None).await?;
        }
        return Ok(None);
    }

    let Some(source_project) = action.source_project().map(ToOwned::to_owned) else {
        return Ok(None);
    };

    let mut per_package_locking = false;
    let packages = if let Some(source_package) = action.source_package() {
        per_package_locking = true;
        match backend
            .find_package(&source_project, source_package, true)
            .await?
        {
            Some(package) => vec![package],
            None => {
                return Err(RequestError::UnknownSourcePackage(format!(
                    "{source_project}/{source_package}"
                )));
            },
        }
    } else {
        if backend.find_project(&source_project).await?.is_none() {
            return Err(RequestError::UnknownProject(source_project.clone()));
        }
        if action.kind.is_maintenance_release() {
            per_package_locking = true;
        }
        backend.packages_of(&source_project).await?
    };

    let actions = create_expanded_actions(backend, action, packages, options).await?;
    Ok(Some(Expansion {
        actions,
        per_package_locking,
    }))
}

/// Resolve the release project of one incident leg.
///
/// Patchinfo containers carry no release project. Everything else resolves
/// the declared release project (or the package's link target) through the
/// update instance and requires a maintenance release project there.
async fn release_project_for<B: BuildService + ?Sized>(
    backend: &B,
    template: &RequestAction,
    package: &PackageMeta,
    link_target: Option<&str>,
) -> RequestResult<Option<String>> {
    if package.patchinfo {
        return Ok(None);
    }
    let declared = template
        .target
        .as_ref()
        .and_then(|t| t.release_project.as_deref());
    let Some(base) = declared.or(link_target).filter(|name| !name.is_empty()) else {
        return Err(RequestError::InvalidReleaseTarget(format!(
            "could not determine a release target for package {}/{}",
            package.project, package.name
        )));
    };
    let resolved = update_instance(backend, base).await?;
    let meta = local_project_meta(backend, &resolved).await?;
    if !meta.is_maintenance_release() {
        return Err(RequestError::InvalidReleaseTarget(format!(
            "{resolved} is not a maintenance release project"
        )));
    }
    Ok(Some(resolved))
}

struct LinkWalk {
    /// Final cross-project link target, if the chain leaves the project.
    target_project: Option<String>,
    /// Package name at the end of the local chain.
    package: String,
    /// Local-link suffix stripped for multi-spec containers.
    suffix: String,
    /// Last link declaration seen.
    last_link: Option<LinkInfo>,
    missing_ok: bool,
}

/// Walk the local link chain of a package until it ends or leaves the
/// project.
async fn walk_links<B: BuildService + ?Sized>(
    backend: &B,
    package: &PackageMeta,
) -> RequestResult<LinkWalk> {
    let mut walk = LinkWalk {
        target_project: Some(package.project.clone()),
        package: package.name.clone(),
        suffix: String::new(),
        last_link: None,
        missing_ok: false,
    };
    for _hop in 0..MAX_LINK_DEPTH {
        let current = match &walk.target_project {
            Some(project) if *project == package.project => project.clone(),
            _ => break,
        };
        let directory = backend
            .package_directory(&current, &walk.package, false, None)
            .await?;
        match directory.link {
            Some(link) => {
                walk.suffix = walk
                    .package
                    .strip_prefix(link.package.as_str())
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| walk.package.clone());
                walk.package = link.package.clone();
                walk.target_project = link.project.clone().or(Some(current));
                if link.missing_ok {
                    walk.missing_ok = true;
                }
                walk.last_link = Some(link);
            },
            None => {
                walk.target_project = None;
            },
        }
    }
    if walk
        .target_project
        .as_deref()
        .is_some_and(|project| project == package.project)
    {
        walk.target_project = None;
    }
    Ok(walk)
}

/// Verify a patchinfo's incident project is fully built and published.
///
/// Returns whether at least one repository actually carries the patchinfo,
/// i.e. whether the release would publish binaries.
async fn check_release_readiness<B: BuildService + ?Sized>(
    backend: &B,
    package: &PackageMeta,
) -> RequestResult<bool> {
    let results = backend.version_releases(&package.project).await?;
    if results.is_empty() {
        return Err(RequestError::BuildNotFinished(format!(
            "the project '{}' has no building repositories",
            package.project
        )));
    }

    let mut versrel: HashMap<(String, String), String> = HashMap::new();
    for result in &results {
        check_repository_state(&package.project, result)?;
        for status in &result.statuses {
            let Some(vrel) = &status.versrel else {
                continue;
            };
            let key = (result.repository.clone(), status.package.clone());
            match versrel.get(&key) {
                Some(known) if known != vrel => {
                    return Err(RequestError::VersionReleaseDiffers(format!(
                        "{} has a different version release in the same repository",
                        status.package
                    )));
                },
                Some(_) => {},
                None => {
                    versrel.insert(key, vrel.clone());
                },
            }
        }
    }

    let meta = local_project_meta(backend, &package.project).await?;
    let mut found = false;
    for repository in &meta.repositories {
        let Some(arch) = repository.architectures.first() else {
            continue;
        };
        let status = results
            .iter()
            .find(|r| r.repository == repository.name && r.arch == *arch)
            .and_then(|r| r.statuses.iter().find(|s| s.package == package.name));
        let Some(status) = status else {
            return Err(RequestError::BuildNotFinished(format!(
                "patchinfo {} has no build result for repository '{}'",
                package.name, repository.name
            )));
        };
        if status.code == "excluded" {
            continue;
        }
        if status.code == "broken" {
            return Err(RequestError::BuildNotFinished(format!(
                "patchinfo {} is broken",
                package.name
            )));
        }
        check_published_binaries(backend, package, &repository.name, arch).await?;
        found = true;
    }
    Ok(found)
}

fn check_repository_state(project: &str, result: &BuildResult) -> RequestResult<()> {
    let place = format!("'{project}' / '{}' / {}", result.repository, result.arch);
    if result.dirty {
        return Err(RequestError::BuildNotFinished(format!(
            "the repository {place} needs recalculation by the schedulers"
        )));
    }
    match result.state {
        BuildState::Finished | BuildState::Publishing => Err(RequestError::BuildNotFinished(
            format!("the repository {place} did not finish the publish yet"),
        )),
        BuildState::Published | BuildState::Unpublished => Ok(()),
        _ => Err(RequestError::BuildNotFinished(format!(
            "the repository {place} did not finish the build yet"
        ))),
    }
}

/// The patchinfo must have published binaries built from the current
/// expanded sources; a stale history entry means a source change was not
/// built yet.
async fn check_published_binaries<B: BuildService + ?Sized>(
    backend: &B,
    package: &PackageMeta,
    repository: &str,
    arch: &str,
) -> RequestResult<()> {
    let binaries = backend
        .published_binaries(&package.project, repository, arch, &package.name)
        .await?;
    if binaries.is_empty() {
        return Err(RequestError::BuildNotFinished(format!(
            "patchinfo {} is not yet built for repository '{repository}'",
            package.name
        )));
    }
    let directory = backend
        .package_directory(&package.project, &package.name, true, None)
        .await?;
    let history = backend
        .binary_history(&package.project, repository, &package.name, arch)
        .await?;
    if history
        .last()
        .is_some_and(|entry| entry.srcmd5 == directory.srcmd5)
    {
        return Ok(());
    }
    Err(RequestError::BuildNotFinished(format!(
        "last patchinfo {} is not yet built for repository '{repository}'",
        package.name
    )))
}

/// Re-route a release leg whose link points at another incident: it goes to
/// the unique maintenance release target of the source instead.
async fn reroute_incident_target<B: BuildService + ?Sized>(
    backend: &B,
    source: &ProjectMeta,
) -> RequestResult<String> {
    let mut release_target: Option<String> = None;
    for target in source.release_targets_with(ReleaseTrigger::Maintenance) {
        let releases = matches!(
            backend.find_project(&target.target_project).await?,
            Some(ProjectRef::Local(meta)) if meta.is_maintenance_release()
        );
        if !releases {
            continue;
        }
        if let Some(known) = &release_target
            && *known != target.target_project
        {
            return Err(RequestError::InvalidReleaseTarget(
                "multiple release target projects are not supported".to_string(),
            ));
        }
        release_target = Some(target.target_project.clone());
    }
    release_target.ok_or_else(|| {
        RequestError::InvalidReleaseTarget(
            "can not release to a maintenance incident project".to_string(),
        )
    })
}

async fn create_expanded_actions<B: BuildService + ?Sized>(
    backend: &B,
    template: &RequestAction,
    packages: Vec<PackageRef>,
    options: ExpandOptions,
) -> RequestResult<Vec<RequestAction>> {
    let kind = template.kind;
    let source_project = template.source_project().unwrap_or_default().to_string();
    // The incident identifier is the last segment of the incident project.
    let incident_suffix = if kind.is_maintenance_release() {
        source_project
            .rsplit(':')
            .next()
            .map(|id| format!(".{id}"))
            .unwrap_or_default()
    } else {
        String::new()
    };
    let rev = template.source.as_ref().and_then(|s| s.rev.clone());

    let mut actions = Vec::new();
    let mut found_patchinfo = false;
    let mut new_packages: Vec<PackageMeta> = Vec::new();
    let mut new_targets: Vec<String> = Vec::new();

    for package in packages {
        let PackageRef::Local(package) = package else {
            return Err(RequestError::RemoteSourceUnsupported);
        };

        let walk = walk_links(backend, &package).await?;

        let target_package = if let Some(declared) = template.target_package() {
            declared.to_string()
        } else if kind.is_maintenance_release()
            && let Some(release_name) = &package.release_name
        {
            release_name.clone()
        } else if kind.is_maintenance_release()
            && let Some(linked) = &walk.target_project
            && local_project_meta(backend, linked)
                .await
                .is_ok_and(|meta| meta.is_maintenance_incident())
        {
            // Pre-release-name incidents: the released name is the link
            // target inside the other incident.
            let directory = backend
                .package_directory(linked, &walk.package, false, None)
                .await?;
            directory
                .link
                .map_or_else(|| package.name.clone(), |link| link.package)
        } else if !walk.suffix.is_empty()
            && let Some(stripped) = package.name.strip_suffix(walk.suffix.as_str())
        {
            stripped.to_string()
        } else {
            package.name.clone()
        };

        let release_project = if kind.is_maintenance_incident() {
            release_project_for(backend, template, &package, walk.target_project.as_deref())
                .await?
        } else {
            None
        };

        let mut target_project = match template.target_project() {
            Some(declared) => Some(
                backend
                    .find_project(declared)
                    .await?
                    .ok_or_else(|| RequestError::UnknownTargetProject(declared.to_string()))?
                    .name()
                    .to_string(),
            ),
            None => walk.target_project.clone(),
        };
        if target_project.is_none() && !kind.is_maintenance_release() {
            return Err(RequestError::UnknownTargetProject(
                "target project does not exist".to_string(),
            ));
        }

        if kind.is_maintenance_release()
            && package.patchinfo
            && !options.ignore_build_state
            && check_release_readiness(backend, &package).await?
        {
            found_patchinfo = true;
        }

        if kind.is_maintenance_release()
            && let Some(project) = &target_project
        {
            let resolved = update_instance(backend, project).await?;
            let resolved_meta = local_project_meta(backend, &resolved).await?;
            target_project = if resolved_meta.is_maintenance_incident() {
                let source_meta = local_project_meta(backend, &package.project).await?;
                Some(reroute_incident_target(backend, &source_meta).await?)
            } else {
                Some(resolved)
            };
        }

        // New package containers only exist for release actions; everything
        // else requires the target container.
        if !walk.missing_ok {
            let exists = match (&walk.last_link, &target_project) {
                (Some(_), Some(project)) => {
                    backend.package_exists(project, &walk.package, true).await?
                },
                _ => false,
            };
            if !exists {
                if kind.is_maintenance_release() {
                    let source_meta = local_project_meta(backend, &package.project).await?;
                    for repository in &source_meta.repositories {
                        for target in &repository.release_targets {
                            new_targets.push(target.target_project.clone());
                        }
                    }
                    new_packages.push(package);
                    continue;
                }
                if !kind.is_maintenance_incident() && !kind.is_submit() {
                    return Err(RequestError::UnknownTargetPackage(
                        "target package does not exist".to_string(),
                    ));
                }
            }
        }

        let mut patch = DerivePatch {
            kind: None,
            source: Some(SourceRef {
                project: source_project.clone(),
                package: Some(package.name.clone()),
                rev: rev.clone(),
            }),
            target: None,
        };

        if kind.is_maintenance_incident() {
            if let Some(project) = &target_project {
                new_targets.push(project.clone());
            }
            if release_project.is_some()
                && let Some(mut target) = template.target.clone()
            {
                target.release_project = release_project.clone();
                patch.target = Some(target);
            }
        } else if !package.channel {
            let Some(project) = target_project.clone() else {
                return Err(RequestError::UnknownTargetProject(
                    "target project does not exist".to_string(),
                ));
            };
            new_targets.push(project.clone());
            let mut target = template
                .target
                .clone()
                .unwrap_or_else(|| TargetRef::project(project.clone()));
            target.project = project;
            target.package = Some(format!("{target_package}{incident_suffix}"));
            patch.target = Some(target);
        }

        if kind.is_maintenance_release() {
            let Some(project) = target_project.clone() else {
                return Err(RequestError::UnknownTargetProject(
                    "target project does not exist".to_string(),
                ));
            };
            if package.channel {
                // Channel containers go back as plain submits carrying the
                // possible _channel file change.
                patch.kind = Some(ActionKind::Submit);
                patch.target = Some(TargetRef::package(project, target_package.clone()));
            } else {
                let source_meta = local_project_meta(backend, &package.project).await?;
                if !source_meta.maintenance_releases_into(&project) {
                    return Err(RequestError::WrongLinkedPackageSource(format!(
                        "according to the source link of package {}/{} it would go to \
                         project {project} which is not specified as release target",
                        package.project, package.name
                    )));
                }
            }
        }

        let derived = template.derived(patch);
        // A leg without any content difference is dropped, not created.
        if matches!(
            derived.kind,
            ActionKind::Submit | ActionKind::MaintenanceIncident
        ) && !contains_change(backend, &derived).await
        {
            continue;
        }
        actions.push(derived);
    }

    if kind.is_maintenance_release() && !found_patchinfo && !options.ignore_build_state {
        return Err(RequestError::MissingPatchinfo(
            "maintenance release request without patchinfo would release no binaries".to_string(),
        ));
    }

    broadcast_new_packages(
        backend,
        template,
        &incident_suffix,
        new_packages,
        new_targets,
        &mut actions,
    )
    .await?;

    Ok(actions)
}

/// Fan new package containers (patchinfos, usually) out to every release
/// target of the source.
async fn broadcast_new_packages<B: BuildService + ?Sized>(
    backend: &B,
    template: &RequestAction,
    incident_suffix: &str,
    new_packages: Vec<PackageMeta>,
    new_targets: Vec<String>,
    actions: &mut Vec<RequestAction>,
) -> RequestResult<()> {
    let mut seen = HashSet::new();
    let targets: Vec<String> = new_targets
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();
    let mut seen_packages = HashSet::new();

    for package in new_packages {
        if !seen_packages.insert((package.project.clone(), package.name.clone())) {
            continue;
        }
        let restriction = if package.patchinfo {
            backend
                .patchinfo_release_targets(&package.project, &package.name)
                .await?
        } else {
            Vec::new()
        };
        let source_meta = local_project_meta(backend, &package.project).await?;
        for target in &targets {
            if !restriction.is_empty() && !restriction.contains(target) {
                continue;
            }
            // Targets without an active maintenance trigger get nothing.
            if template.kind.is_maintenance_release()
                && !source_meta.maintenance_releases_into(target)
            {
                continue;
            }
            let mut patch = DerivePatch {
                kind: None,
                source: Some(SourceRef {
                    project: package.project.clone(),
                    package: Some(package.name.clone()),
                    rev: template.source.as_ref().and_then(|s| s.rev.clone()),
                }),
                target: None,
            };
            if !template.kind.is_maintenance_incident() {
                patch.target = Some(TargetRef::package(
                    target.clone(),
                    format!("{}{incident_suffix}", package.name),
                ));
            }
            actions.push(template.derived(patch));
        }
    }
    Ok(())
}

/// Verify the action's sources expand cleanly, optionally freezing the
/// revision to the current source checksum.
///
/// Release-bound patchinfos are deliberately not frozen so their metadata
/// stays editable until acceptance.
///
/// # Errors
///
/// [`RequestError::ExpandError`] when the backend cannot expand the source
/// (broken link, missing revision).
pub async fn check_expand_errors<B: BuildService + ?Sized>(
    backend: &B,
    action: &mut RequestAction,
    add_revision: bool,
) -> RequestResult<()> {
    if !action.kind.expandable() {
        return Ok(());
    }
    let Some(source) = action.source.clone() else {
        return Ok(());
    };
    let Some(package) = &source.package else {
        return Ok(());
    };

    let expand = !action.update_link;
    let directory = match backend
        .package_directory(&source.project, package, expand, source.rev.as_deref())
        .await
    {
        Ok(directory) => directory,
        Err(_) => {
            let at_rev = source
                .rev
                .as_ref()
                .map(|rev| format!(" for revision {rev}"))
                .unwrap_or_default();
            return Err(RequestError::ExpandError(format!(
                "the source of package {}/{package}{at_rev} is broken",
                source.project
            )));
        },
    };

    if add_revision && source.rev.is_none() {
        if action.kind.is_maintenance_release()
            && directory.entries.iter().any(|entry| entry == "_patchinfo")
        {
            return Ok(());
        }
        if let Some(source) = &mut action.source {
            source.rev = Some(directory.srcmd5);
        }
    }
    Ok(())
}
