//! In-memory [`BuildService`] double for the engine tests.
//!
//! State is seeded through builder methods before the backend is handed to
//! the code under test; every trait method then answers from the seeded
//! maps. Unseeded lookups answer "absent"/"empty" rather than failing, so a
//! test only describes the state it cares about.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use slipway_core::backend::{
    Attribute, AttributeKind, BackendError, BuildResult, BuildService, DirectoryMeta,
    HistoryEntry, PackageMeta, PackageRef, ProjectKind, ProjectMeta, ProjectRef,
};
use slipway_core::endpoint::Endpoint;
use slipway_core::identity::Reviewer;

type DiffKey = (String, String, String, String);

#[derive(Default)]
pub(crate) struct MockBuildService {
    projects: HashMap<String, ProjectMeta>,
    remote_projects: HashSet<String>,
    packages: HashMap<(String, String), PackageMeta>,
    // Packages reachable only through a project link.
    link_only: HashSet<(String, String)>,
    directories: HashMap<(String, String, bool), DirectoryMeta>,
    broken_directories: HashSet<(String, String)>,
    attributes: HashMap<(String, Option<String>, AttributeKind), Attribute>,
    build_results: HashMap<String, Vec<BuildResult>>,
    binaries: HashMap<(String, String, String, String), Vec<String>>,
    histories: HashMap<(String, String, String, String), Vec<HistoryEntry>>,
    patchinfo_targets: HashMap<(String, String), Vec<String>>,
    diffs: HashMap<DiffKey, String>,
    failing_diffs: HashSet<DiffKey>,
    users: HashSet<String>,
    groups: HashSet<String>,
    roles: HashSet<String>,
    project_maintainers: HashSet<(String, String)>,
    package_maintainers: HashSet<(String, String, String)>,
    weak_conflicts: HashMap<(String, String), String>,
    reviewers: HashMap<(String, Option<String>), Vec<Reviewer>>,
    unreadable_sources: HashSet<(String, String)>,
}

impl MockBuildService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_project(&mut self, name: &str, kind: ProjectKind) {
        self.add_project_meta(ProjectMeta {
            name: name.to_string(),
            kind,
            repositories: Vec::new(),
        });
    }

    pub(crate) fn add_project_meta(&mut self, meta: ProjectMeta) {
        self.projects.insert(meta.name.clone(), meta);
    }

    pub(crate) fn add_remote_project(&mut self, name: &str) {
        self.remote_projects.insert(name.to_string());
    }

    pub(crate) fn add_package(&mut self, project: &str, name: &str) {
        self.add_package_meta(PackageMeta::new(project, name));
    }

    pub(crate) fn add_package_meta(&mut self, meta: PackageMeta) {
        self.packages
            .insert((meta.project.clone(), meta.name.clone()), meta);
    }

    /// Seed a package visible only when project links are followed.
    pub(crate) fn add_package_via_link(&mut self, project: &str, name: &str) {
        self.add_package(project, name);
        self.link_only
            .insert((project.to_string(), name.to_string()));
    }

    pub(crate) fn set_directory(
        &mut self,
        project: &str,
        package: &str,
        expand: bool,
        directory: DirectoryMeta,
    ) {
        self.directories
            .insert((project.to_string(), package.to_string(), expand), directory);
    }

    pub(crate) fn fail_directory(&mut self, project: &str, package: &str) {
        self.broken_directories
            .insert((project.to_string(), package.to_string()));
    }

    pub(crate) fn set_attribute(
        &mut self,
        project: &str,
        package: Option<&str>,
        kind: AttributeKind,
        values: Vec<String>,
    ) {
        self.attributes.insert(
            (project.to_string(), package.map(ToOwned::to_owned), kind),
            Attribute { values },
        );
    }

    pub(crate) fn set_build_results(&mut self, project: &str, results: Vec<BuildResult>) {
        self.build_results.insert(project.to_string(), results);
    }

    pub(crate) fn set_binaries(
        &mut self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
        binaries: Vec<String>,
    ) {
        self.binaries.insert(
            (
                project.to_string(),
                repository.to_string(),
                arch.to_string(),
                package.to_string(),
            ),
            binaries,
        );
    }

    pub(crate) fn set_history(
        &mut self,
        project: &str,
        repository: &str,
        package: &str,
        arch: &str,
        history: Vec<HistoryEntry>,
    ) {
        self.histories.insert(
            (
                project.to_string(),
                repository.to_string(),
                package.to_string(),
                arch.to_string(),
            ),
            history,
        );
    }

    pub(crate) fn set_patchinfo_targets(
        &mut self,
        project: &str,
        package: &str,
        targets: Vec<String>,
    ) {
        self.patchinfo_targets
            .insert((project.to_string(), package.to_string()), targets);
    }

    pub(crate) fn set_diff(
        &mut self,
        source_project: &str,
        source_package: &str,
        target_project: &str,
        target_package: &str,
        diff: &str,
    ) {
        self.diffs.insert(
            diff_key(source_project, source_package, target_project, target_package),
            diff.to_string(),
        );
    }

    pub(crate) fn fail_diff(
        &mut self,
        source_project: &str,
        source_package: &str,
        target_project: &str,
        target_package: &str,
    ) {
        self.failing_diffs.insert(diff_key(
            source_project,
            source_package,
            target_project,
            target_package,
        ));
    }

    pub(crate) fn add_user(&mut self, login: &str) {
        self.users.insert(login.to_string());
    }

    pub(crate) fn add_group(&mut self, title: &str) {
        self.groups.insert(title.to_string());
    }

    pub(crate) fn add_role(&mut self, title: &str) {
        self.roles.insert(title.to_string());
    }

    pub(crate) fn allow_modify_project(&mut self, login: &str, project: &str) {
        self.project_maintainers
            .insert((login.to_string(), project.to_string()));
    }

    pub(crate) fn allow_modify_package(&mut self, login: &str, project: &str, package: &str) {
        self.package_maintainers.insert((
            login.to_string(),
            project.to_string(),
            package.to_string(),
        ));
    }

    pub(crate) fn set_weak_dependency_conflict(
        &mut self,
        project: &str,
        package: &str,
        description: &str,
    ) {
        self.weak_conflicts.insert(
            (project.to_string(), package.to_string()),
            description.to_string(),
        );
    }

    pub(crate) fn add_reviewer(&mut self, project: &str, package: Option<&str>, reviewer: Reviewer) {
        self.reviewers
            .entry((project.to_string(), package.map(ToOwned::to_owned)))
            .or_default()
            .push(reviewer);
    }

    pub(crate) fn deny_source_read(&mut self, project: &str, package: &str) {
        self.unreadable_sources
            .insert((project.to_string(), package.to_string()));
    }
}

fn diff_key(
    source_project: &str,
    source_package: &str,
    target_project: &str,
    target_package: &str,
) -> DiffKey {
    (
        source_project.to_string(),
        source_package.to_string(),
        target_project.to_string(),
        target_package.to_string(),
    )
}

#[async_trait]
impl BuildService for MockBuildService {
    async fn find_project(&self, name: &str) -> Result<Option<ProjectRef>, BackendError> {
        if let Some(meta) = self.projects.get(name) {
            return Ok(Some(ProjectRef::Local(meta.clone())));
        }
        if self.remote_projects.contains(name) {
            return Ok(Some(ProjectRef::Remote(name.to_string())));
        }
        Ok(None)
    }

    async fn find_package(
        &self,
        project: &str,
        package: &str,
        follow_project_links: bool,
    ) -> Result<Option<PackageRef>, BackendError> {
        let key = (project.to_string(), package.to_string());
        if !follow_project_links && self.link_only.contains(&key) {
            return Ok(None);
        }
        Ok(self.packages.get(&key).cloned().map(PackageRef::Local))
    }

    async fn package_exists(
        &self,
        project: &str,
        package: &str,
        follow_project_links: bool,
    ) -> Result<bool, BackendError> {
        Ok(self
            .find_package(project, package, follow_project_links)
            .await?
            .is_some())
    }

    async fn packages_of(&self, project: &str) -> Result<Vec<PackageRef>, BackendError> {
        let mut metas: Vec<&PackageMeta> = self
            .packages
            .values()
            .filter(|meta| meta.project == project)
            .collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(metas
            .into_iter()
            .map(|meta| PackageRef::Local(meta.clone()))
            .collect())
    }

    async fn package_directory(
        &self,
        project: &str,
        package: &str,
        expand: bool,
        _rev: Option<&str>,
    ) -> Result<DirectoryMeta, BackendError> {
        if self
            .broken_directories
            .contains(&(project.to_string(), package.to_string()))
        {
            return Err(BackendError::transport(format!(
                "conflict in link expansion of {project}/{package}"
            )));
        }
        Ok(self
            .directories
            .get(&(project.to_string(), package.to_string(), expand))
            .cloned()
            .unwrap_or_default())
    }

    async fn find_attribute(
        &self,
        project: &str,
        package: Option<&str>,
        kind: AttributeKind,
    ) -> Result<Option<Attribute>, BackendError> {
        Ok(self
            .attributes
            .get(&(project.to_string(), package.map(ToOwned::to_owned), kind))
            .cloned())
    }

    async fn version_releases(&self, project: &str) -> Result<Vec<BuildResult>, BackendError> {
        Ok(self.build_results.get(project).cloned().unwrap_or_default())
    }

    async fn published_binaries(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Vec<String>, BackendError> {
        Ok(self
            .binaries
            .get(&(
                project.to_string(),
                repository.to_string(),
                arch.to_string(),
                package.to_string(),
            ))
            .cloned()
            .unwrap_or_default())
    }

    async fn binary_history(
        &self,
        project: &str,
        repository: &str,
        package: &str,
        arch: &str,
    ) -> Result<Vec<HistoryEntry>, BackendError> {
        Ok(self
            .histories
            .get(&(
                project.to_string(),
                repository.to_string(),
                package.to_string(),
                arch.to_string(),
            ))
            .cloned()
            .unwrap_or_default())
    }

    async fn patchinfo_release_targets(
        &self,
        project: &str,
        package: &str,
    ) -> Result<Vec<String>, BackendError> {
        Ok(self
            .patchinfo_targets
            .get(&(project.to_string(), package.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn source_diff(
        &self,
        source: &Endpoint,
        _rev: Option<&str>,
        target: &Endpoint,
    ) -> Result<String, BackendError> {
        let key = diff_key(
            &source.project,
            source.package.as_deref().unwrap_or_default(),
            &target.project,
            target.package.as_deref().unwrap_or_default(),
        );
        if self.failing_diffs.contains(&key) {
            return Err(BackendError::Timeout {
                seconds: 30,
                context: format!("diff {source} against {target}"),
            });
        }
        Ok(self.diffs.get(&key).cloned().unwrap_or_default())
    }

    async fn user_exists(&self, login: &str) -> Result<bool, BackendError> {
        Ok(self.users.contains(login))
    }

    async fn group_exists(&self, title: &str) -> Result<bool, BackendError> {
        Ok(self.groups.contains(title))
    }

    async fn role_exists(&self, title: &str) -> Result<bool, BackendError> {
        Ok(self.roles.contains(title))
    }

    async fn can_modify_project(
        &self,
        login: &str,
        project: &str,
    ) -> Result<bool, BackendError> {
        Ok(self
            .project_maintainers
            .contains(&(login.to_string(), project.to_string())))
    }

    async fn can_modify_package(
        &self,
        login: &str,
        project: &str,
        package: &str,
    ) -> Result<bool, BackendError> {
        Ok(self.package_maintainers.contains(&(
            login.to_string(),
            project.to_string(),
            package.to_string(),
        ))
            || self.can_modify_project(login, project).await?)
    }

    async fn weak_dependency_conflict(
        &self,
        project: &str,
        package: &str,
    ) -> Result<Option<String>, BackendError> {
        Ok(self
            .weak_conflicts
            .get(&(project.to_string(), package.to_string()))
            .cloned())
    }

    async fn reviewers_of(
        &self,
        project: &str,
        package: Option<&str>,
    ) -> Result<Vec<Reviewer>, BackendError> {
        Ok(self
            .reviewers
            .get(&(project.to_string(), package.map(ToOwned::to_owned)))
            .cloned()
            .unwrap_or_default())
    }

    async fn source_readable(&self, project: &str, package: &str) -> Result<bool, BackendError> {
        Ok(!self
            .unreadable_sources
            .contains(&(project.to_string(), package.to_string())))
    }
}
