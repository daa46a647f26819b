//! The action kind registry and the request action itself.
//!
//! [`ActionKind`] is the closed set of things a request can declare; each
//! kind answers fixed capability queries that drive dispatch everywhere else
//! in the engine. [`RequestAction`] is one declared intent within a request:
//! where it comes from, where it goes, and under which options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use slipway_core::endpoint::{Direction, Endpoint};

use crate::error::{RequestError, RequestResult};

/// The closed set of action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Submit package sources from one location to another.
    Submit,
    /// Delete the target package or project.
    Delete,
    /// Reassign development ownership of the target package.
    ChangeDevel,
    /// Grant a role on the target to a user or group.
    AddRole,
    /// Set the bugowner of the target.
    SetBugowner,
    /// Stage package fixes into a maintenance incident project.
    MaintenanceIncident,
    /// Release a finished maintenance incident to its release targets.
    MaintenanceRelease,
    /// Legacy request grouping. Resolvable for stored data only; creating
    /// new instances is refused.
    Group,
}

impl ActionKind {
    /// Resolve a wire-format type name.
    ///
    /// # Errors
    ///
    /// [`RequestError::UnknownActionType`] if the name has no registered kind.
    pub fn from_wire_name(name: &str) -> RequestResult<Self> {
        match name {
            "submit" => Ok(Self::Submit),
            "delete" => Ok(Self::Delete),
            "change_devel" => Ok(Self::ChangeDevel),
            "add_role" => Ok(Self::AddRole),
            "set_bugowner" => Ok(Self::SetBugowner),
            "maintenance_incident" => Ok(Self::MaintenanceIncident),
            "maintenance_release" => Ok(Self::MaintenanceRelease),
            "group" => Ok(Self::Group),
            other => Err(RequestError::UnknownActionType(other.to_string())),
        }
    }

    /// The wire-format type name.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Delete => "delete",
            Self::ChangeDevel => "change_devel",
            Self::AddRole => "add_role",
            Self::SetBugowner => "set_bugowner",
            Self::MaintenanceIncident => "maintenance_incident",
            Self::MaintenanceRelease => "maintenance_release",
            Self::Group => "group",
        }
    }

    /// Whether this is a submit action.
    #[must_use]
    pub fn is_submit(self) -> bool {
        self == Self::Submit
    }

    /// Whether this is a maintenance incident action.
    #[must_use]
    pub fn is_maintenance_incident(self) -> bool {
        self == Self::MaintenanceIncident
    }

    /// Whether this is a maintenance release action.
    #[must_use]
    pub fn is_maintenance_release(self) -> bool {
        self == Self::MaintenanceRelease
    }

    /// Kinds that declare a source to move content from.
    #[must_use]
    pub fn requires_source(self) -> bool {
        matches!(
            self,
            Self::Submit | Self::ChangeDevel | Self::MaintenanceIncident | Self::MaintenanceRelease
        )
    }

    /// Kinds whose final targets are computed by the source expander.
    #[must_use]
    pub fn expandable(self) -> bool {
        matches!(
            self,
            Self::Submit | Self::MaintenanceIncident | Self::MaintenanceRelease
        )
    }

    /// Kinds that tolerate a source project living on a remote instance.
    #[must_use]
    pub fn tolerates_remote_source(self) -> bool {
        matches!(self, Self::Submit | Self::MaintenanceIncident)
    }

    /// Kinds exempt from the per-request duplicate-target check: multiple
    /// role grants or incident legs against the same target are legitimate.
    #[must_use]
    pub fn exempt_from_uniqueness(self) -> bool {
        matches!(self, Self::AddRole | Self::MaintenanceIncident)
    }

    /// The minimum review priority mandated by this kind, if any.
    #[must_use]
    pub fn minimum_review_priority(self) -> Option<ReviewPriority> {
        match self {
            Self::MaintenanceRelease => Some(ReviewPriority::Important),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Review priority levels a kind can mandate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    /// No urgency.
    Low,
    /// Default priority.
    Moderate,
    /// Should be reviewed promptly.
    Important,
    /// Blocks everything else.
    Critical,
}

/// What accepting the request does to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceUpdatePolicy {
    /// Update the source to match the accepted state.
    #[serde(rename = "update")]
    Update,
    /// Leave the source untouched.
    #[serde(rename = "noupdate")]
    NoUpdate,
    /// Remove branch scaffolding from the source.
    #[serde(rename = "cleanup")]
    Cleanup,
}

impl SourceUpdatePolicy {
    /// Resolve a wire-format policy name.
    ///
    /// # Errors
    ///
    /// [`RequestError::MalformedAction`] for names outside the grammar.
    pub fn from_wire_name(name: &str) -> RequestResult<Self> {
        match name {
            "update" => Ok(Self::Update),
            "noupdate" => Ok(Self::NoUpdate),
            "cleanup" => Ok(Self::Cleanup),
            other => Err(RequestError::MalformedAction(format!(
                "invalid sourceupdate option '{other}'"
            ))),
        }
    }

    /// The wire-format policy name.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::NoUpdate => "noupdate",
            Self::Cleanup => "cleanup",
        }
    }

    /// Whether this policy mutates the source on acceptance.
    #[must_use]
    pub fn mutates_source(self) -> bool {
        matches!(self, Self::Update | Self::Cleanup)
    }
}

/// Where an action takes its content from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source project name.
    pub project: String,
    /// Source package name, if package-scoped.
    pub package: Option<String>,
    /// Pinned source revision, if any.
    pub rev: Option<String>,
}

impl SourceRef {
    /// A package-scoped source.
    #[must_use]
    pub fn package(project: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: Some(package.into()),
            rev: None,
        }
    }

    /// A project-scoped source.
    #[must_use]
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: None,
            rev: None,
        }
    }

    /// Pin the source to a revision.
    #[must_use]
    pub fn at_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }
}

/// Where an action applies its change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    /// Target project name.
    pub project: String,
    /// Target package name, if package-scoped.
    pub package: Option<String>,
    /// Target repository, for repository-scoped deletions.
    pub repository: Option<String>,
    /// Project an incident leg eventually releases into.
    pub release_project: Option<String>,
}

impl TargetRef {
    /// A package-scoped target.
    #[must_use]
    pub fn package(project: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: Some(package.into()),
            repository: None,
            release_project: None,
        }
    }

    /// A project-scoped target.
    #[must_use]
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: None,
            repository: None,
            release_project: None,
        }
    }
}

/// The exact source state a request was accepted at.
///
/// Written exactly once when acceptance executes; immutable afterwards.
/// Used for auditability and idempotent re-acceptance checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptInfo {
    /// Accepted source revision.
    pub rev: Option<String>,
    /// Source checksum at acceptance.
    pub srcmd5: String,
    /// Source checksum before acceptance.
    pub osrcmd5: Option<String>,
    /// Link-expanded source checksum at acceptance.
    pub xsrcmd5: Option<String>,
    /// Link-expanded source checksum before acceptance.
    pub oxsrcmd5: Option<String>,
}

/// A patch applied to a template action when deriving a concrete one.
///
/// Expansion never mutates the template; each derived action is built from
/// the immutable template plus one of these records.
#[derive(Debug, Clone, Default)]
pub struct DerivePatch {
    /// Replace the action kind.
    pub kind: Option<ActionKind>,
    /// Replace the source reference.
    pub source: Option<SourceRef>,
    /// Replace the target reference.
    pub target: Option<TargetRef>,
}

/// One declared intent within a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAction {
    /// Identifier of this action, carried into notification payloads.
    pub id: Uuid,
    /// What the action does.
    pub kind: ActionKind,
    /// Where content comes from. Absent for delete/add_role/set_bugowner.
    pub source: Option<SourceRef>,
    /// Where the change lands.
    pub target: Option<TargetRef>,
    /// What accepting does to the source.
    pub source_update: Option<SourceUpdatePolicy>,
    /// Whether to resolve/flatten a source link as part of acceptance.
    pub update_link: bool,
    /// Version-ordering hint for targets requiring monotonic origin versions.
    pub make_origin_older: bool,
    /// Acting person for role/delegation actions. Mutually exclusive with
    /// `group`.
    pub person: Option<String>,
    /// Acting group for role/delegation actions. Mutually exclusive with
    /// `person`.
    pub group: Option<String>,
    /// Role accompanying `person` or `group`.
    pub role: Option<String>,
    /// Populated exactly once after successful execution.
    pub accept_info: Option<AcceptInfo>,
    /// When the action was created.
    pub created_at: DateTime<Utc>,
}

impl RequestAction {
    /// Create a new action of the given kind.
    ///
    /// # Errors
    ///
    /// [`RequestError::UnsupportedLegacyAction`] for [`ActionKind::Group`]:
    /// the variant resolves for stored data, but new instances are refused.
    pub fn new(kind: ActionKind) -> RequestResult<Self> {
        if kind == ActionKind::Group {
            return Err(RequestError::UnsupportedLegacyAction);
        }
        Ok(Self::stored(kind))
    }

    /// Re-hydrate an action of the given kind without the legacy-kind guard.
    ///
    /// Only for materializing already-persisted actions (and tests); new
    /// actions go through [`RequestAction::new`].
    #[must_use]
    pub fn stored(kind: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            source: None,
            target: None,
            source_update: None,
            update_link: false,
            make_origin_older: false,
            person: None,
            group: None,
            role: None,
            accept_info: None,
            created_at: Utc::now(),
        }
    }

    /// Set the source reference.
    #[must_use]
    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the target reference.
    #[must_use]
    pub fn with_target(mut self, target: TargetRef) -> Self {
        self.target = Some(target);
        self
    }

    /// The source project name, if a source is declared.
    #[must_use]
    pub fn source_project(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.project.as_str())
    }

    /// The source package name, if declared.
    #[must_use]
    pub fn source_package(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.package.as_deref())
    }

    /// The target project name, if a target is declared.
    #[must_use]
    pub fn target_project(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.project.as_str())
    }

    /// The target package name, if declared.
    #[must_use]
    pub fn target_package(&self) -> Option<&str> {
        self.target.as_ref().and_then(|t| t.package.as_deref())
    }

    /// The endpoint on the given side, if declared.
    #[must_use]
    pub fn endpoint(&self, direction: Direction) -> Option<Endpoint> {
        match direction {
            Direction::Source => self.source.as_ref().map(|s| Endpoint {
                project: s.project.clone(),
                package: s.package.clone(),
            }),
            Direction::Target => self.target.as_ref().map(|t| Endpoint {
                project: t.project.clone(),
                package: t.package.clone(),
            }),
        }
    }

    /// Whether the endpoint on the given side names exactly this
    /// project/package pair.
    #[must_use]
    pub fn matches_package(&self, direction: Direction, project: &str, package: &str) -> bool {
        self.endpoint(direction)
            .is_some_and(|ep| ep.matches(project, package))
    }

    /// Whether source and target resolve to the identical project/package pair.
    #[must_use]
    pub fn source_equals_target(&self) -> bool {
        match (&self.source, &self.target) {
            (Some(s), Some(t)) => {
                s.project == t.project && s.package.is_some() && s.package == t.package
            },
            _ => false,
        }
    }

    /// Record the accepted source state. Write-once.
    ///
    /// # Errors
    ///
    /// [`RequestError::IllegalRequest`] if accept info was already recorded.
    pub fn set_accept_info(&mut self, info: AcceptInfo) -> RequestResult<()> {
        if self.accept_info.is_some() {
            return Err(RequestError::IllegalRequest(
                "accept info is already recorded for this action".to_string(),
            ));
        }
        self.accept_info = Some(info);
        Ok(())
    }

    /// Build a derived action from this template and a patch.
    ///
    /// The derived action gets a fresh identity and never carries accept
    /// info; the template stays untouched.
    #[must_use]
    pub fn derived(&self, patch: DerivePatch) -> Self {
        let mut action = self.clone();
        action.id = Uuid::new_v4();
        action.accept_info = None;
        if let Some(kind) = patch.kind {
            action.kind = kind;
        }
        if let Some(source) = patch.source {
            action.source = Some(source);
        }
        if let Some(target) = patch.target {
            action.target = Some(target);
        }
        action
    }

    /// The duplicate-detection key within a request, or `None` for kinds
    /// exempt from the uniqueness rule.
    #[must_use]
    pub fn duplicate_key(&self) -> Option<(ActionKind, Option<&str>, Option<&str>)> {
        if self.kind.exempt_from_uniqueness() {
            return None;
        }
        Some((self.kind, self.target_project(), self.target_package()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in [
            ActionKind::Submit,
            ActionKind::Delete,
            ActionKind::ChangeDevel,
            ActionKind::AddRole,
            ActionKind::SetBugowner,
            ActionKind::MaintenanceIncident,
            ActionKind::MaintenanceRelease,
            ActionKind::Group,
        ] {
            assert_eq!(ActionKind::from_wire_name(kind.wire_name()).unwrap(), kind);
        }
        assert!(matches!(
            ActionKind::from_wire_name("merge"),
            Err(RequestError::UnknownActionType(_))
        ));
    }

    #[test]
    fn test_capability_flags() {
        assert!(ActionKind::Submit.is_submit());
        assert!(!ActionKind::Submit.is_maintenance_release());
        assert!(ActionKind::MaintenanceIncident.is_maintenance_incident());
        assert!(ActionKind::MaintenanceRelease.expandable());
        assert!(!ActionKind::Delete.expandable());
        assert!(!ActionKind::Delete.requires_source());
        assert!(ActionKind::ChangeDevel.requires_source());
        assert!(ActionKind::AddRole.exempt_from_uniqueness());
        assert!(!ActionKind::Submit.exempt_from_uniqueness());
    }

    #[test]
    fn test_minimum_review_priority() {
        assert_eq!(
            ActionKind::MaintenanceRelease.minimum_review_priority(),
            Some(ReviewPriority::Important)
        );
        assert_eq!(ActionKind::Submit.minimum_review_priority(), None);
    }

    #[test]
    fn test_group_creation_refused() {
        assert!(matches!(
            RequestAction::new(ActionKind::Group),
            Err(RequestError::UnsupportedLegacyAction)
        ));
        // Stored legacy data still materializes.
        assert_eq!(RequestAction::stored(ActionKind::Group).kind, ActionKind::Group);
    }

    #[test]
    fn test_accept_info_write_once() {
        let mut action = RequestAction::new(ActionKind::Submit).unwrap();
        let info = AcceptInfo {
            rev: Some("7".to_string()),
            srcmd5: "abc".to_string(),
            osrcmd5: None,
            xsrcmd5: None,
            oxsrcmd5: None,
        };
        action.set_accept_info(info.clone()).unwrap();
        assert!(matches!(
            action.set_accept_info(info),
            Err(RequestError::IllegalRequest(_))
        ));
    }

    #[test]
    fn test_derived_leaves_template_untouched() {
        let template = RequestAction::new(ActionKind::MaintenanceRelease)
            .unwrap()
            .with_source(SourceRef::project("incident:42"))
            .with_target(TargetRef::project("standard"));
        let derived = template.derived(DerivePatch {
            kind: Some(ActionKind::Submit),
            source: Some(SourceRef::package("incident:42", "pkgA")),
            target: Some(TargetRef::package("standard", "pkgA")),
        });
        assert_eq!(derived.kind, ActionKind::Submit);
        assert_eq!(derived.source_package(), Some("pkgA"));
        assert_ne!(derived.id, template.id);
        // Template unchanged.
        assert_eq!(template.kind, ActionKind::MaintenanceRelease);
        assert_eq!(template.source_package(), None);
    }

    #[test]
    fn test_source_equals_target() {
        let action = RequestAction::new(ActionKind::Submit)
            .unwrap()
            .with_source(SourceRef::package("prj", "pkg"))
            .with_target(TargetRef::package("prj", "pkg"));
        assert!(action.source_equals_target());

        let action = action.with_target(TargetRef::package("other", "pkg"));
        assert!(!action.source_equals_target());
    }

    #[test]
    fn test_matches_package() {
        let action = RequestAction::new(ActionKind::Submit)
            .unwrap()
            .with_source(SourceRef::package("home:alice", "pkgA"));
        assert!(action.matches_package(Direction::Source, "home:alice", "pkgA"));
        assert!(!action.matches_package(Direction::Target, "home:alice", "pkgA"));
    }
}
