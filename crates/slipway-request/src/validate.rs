//! Structural sanity checks on actions.
//!
//! Validation is side-effect-free and performs no backend I/O: every rule is
//! evaluated independently and the defects are accumulated, so one pass can
//! report several problems at once. Anything that needs backend state
//! belongs to the permission checker or the expander instead.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use slipway_core::name::{valid_package_name, valid_project_name};

use crate::action::RequestAction;

/// The action field a defect refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionField {
    /// `source.project`
    SourceProject,
    /// `source.package`
    SourcePackage,
    /// `target.project`
    TargetProject,
    /// `target.package`
    TargetPackage,
    /// `person`
    Person,
    /// `role`
    Role,
}

impl fmt::Display for ActionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SourceProject => "source project",
            Self::SourcePackage => "source package",
            Self::TargetProject => "target project",
            Self::TargetPackage => "target package",
            Self::Person => "person",
            Self::Role => "role",
        };
        write!(f, "{name}")
    }
}

/// One field-level validation defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The defective field.
    pub field: ActionField,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    fn new(field: ActionField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

/// Check one action for structural defects.
///
/// Returns every defect found; an empty result means the action is sane.
#[must_use]
pub fn check_sanity(action: &RequestAction) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let kind = action.kind;

    if kind.requires_source() {
        if blank(action.source_project()) {
            errors.push(FieldError::new(
                ActionField::SourceProject,
                format!("should not be empty for {kind} requests"),
            ));
        }
        if !kind.is_maintenance_incident() && blank(action.source_package()) {
            errors.push(FieldError::new(
                ActionField::SourcePackage,
                format!("should not be empty for {kind} requests"),
            ));
        }
        if blank(action.target_project()) {
            errors.push(FieldError::new(
                ActionField::TargetProject,
                format!("should not be empty for {kind} requests"),
            ));
        }
        if action.source_equals_target() && (action.source_update.is_some() || action.update_link)
        {
            errors.push(FieldError::new(
                ActionField::TargetPackage,
                "no source changes are allowed, if source and target is identical",
            ));
        }
    }

    if let Some(package) = action.target_package()
        && !valid_package_name(package)
    {
        errors.push(FieldError::new(
            ActionField::TargetPackage,
            "is invalid package name",
        ));
    }
    if let Some(package) = action.source_package()
        && !valid_package_name(package)
    {
        errors.push(FieldError::new(
            ActionField::SourcePackage,
            "is invalid package name",
        ));
    }
    if let Some(project) = action.target_project()
        && !project.is_empty()
        && !valid_project_name(project)
    {
        errors.push(FieldError::new(
            ActionField::TargetProject,
            "is invalid project name",
        ));
    }
    if let Some(project) = action.source_project()
        && !project.is_empty()
        && !valid_project_name(project)
    {
        errors.push(FieldError::new(
            ActionField::SourceProject,
            "is invalid project name",
        ));
    }

    if action.person.is_some() && action.group.is_some() {
        errors.push(FieldError::new(
            ActionField::Person,
            "person and group are mutually exclusive",
        ));
    }
    if (action.person.is_some() || action.group.is_some()) && action.role.is_none() {
        errors.push(FieldError::new(
            ActionField::Role,
            "must accompany person or group",
        ));
    }

    errors
}

/// Check the duplicate-target rule across the actions of one request.
///
/// No two actions may share kind, target project and target package;
/// add_role and maintenance_incident actions are exempt. This is the
/// structural half of the invariant; atomic enforcement on persist is the
/// store's concern.
#[must_use]
pub fn check_uniqueness(actions: &[RequestAction]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for action in actions {
        if let Some(key) = action.duplicate_key() {
            let owned = (
                key.0,
                key.1.map(ToOwned::to_owned),
                key.2.map(ToOwned::to_owned),
            );
            if !seen.insert(owned) {
                errors.push(FieldError::new(
                    ActionField::TargetPackage,
                    format!(
                        "duplicate {} action for target {}/{}",
                        action.kind,
                        action.target_project().unwrap_or(""),
                        action.target_package().unwrap_or(""),
                    ),
                ));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, SourceRef, SourceUpdatePolicy, TargetRef};

    fn submit(source: Option<SourceRef>, target: Option<TargetRef>) -> RequestAction {
        let mut action = RequestAction::new(ActionKind::Submit).unwrap();
        action.source = source;
        action.target = target;
        action
    }

    #[test]
    fn test_submit_requires_source_and_target() {
        let errors = check_sanity(&submit(None, None));
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&ActionField::SourceProject));
        assert!(fields.contains(&ActionField::SourcePackage));
        assert!(fields.contains(&ActionField::TargetProject));
    }

    #[test]
    fn test_incident_tolerates_blank_source_package() {
        let mut action = RequestAction::new(ActionKind::MaintenanceIncident).unwrap();
        action.source = Some(SourceRef::project("home:alice:fix"));
        action.target = Some(TargetRef::project("maintenance"));
        assert!(check_sanity(&action).is_empty());
    }

    #[test]
    fn test_delete_needs_no_source() {
        let mut action = RequestAction::new(ActionKind::Delete).unwrap();
        action.target = Some(TargetRef::package("prj", "pkg"));
        assert!(check_sanity(&action).is_empty());
    }

    #[test]
    fn test_identical_source_and_target_rejects_source_options() {
        let mut action = submit(
            Some(SourceRef::package("prj", "pkg")),
            Some(TargetRef::package("prj", "pkg")),
        );
        assert!(check_sanity(&action).is_empty());

        action.source_update = Some(SourceUpdatePolicy::Cleanup);
        let errors = check_sanity(&action);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, ActionField::TargetPackage);

        action.source_update = None;
        action.update_link = true;
        assert_eq!(check_sanity(&action).len(), 1);
    }

    #[test]
    fn test_invalid_names_reported() {
        let action = submit(
            Some(SourceRef::package("prj:", "_hidden")),
            Some(TargetRef::package("ok", "pkg")),
        );
        let fields: Vec<_> = check_sanity(&action).iter().map(|e| e.field).collect();
        assert!(fields.contains(&ActionField::SourceProject));
        assert!(fields.contains(&ActionField::SourcePackage));
        assert!(!fields.contains(&ActionField::TargetProject));
    }

    #[test]
    fn test_person_group_exclusive_and_role_required() {
        let mut action = RequestAction::new(ActionKind::AddRole).unwrap();
        action.target = Some(TargetRef::package("prj", "pkg"));
        action.person = Some("alice".to_string());
        action.group = Some("reviewers".to_string());
        let fields: Vec<_> = check_sanity(&action).iter().map(|e| e.field).collect();
        assert!(fields.contains(&ActionField::Person));
        assert!(fields.contains(&ActionField::Role));

        action.group = None;
        action.role = Some("maintainer".to_string());
        assert!(check_sanity(&action).is_empty());
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let action = submit(
            Some(SourceRef::package("home:alice", "pkgA")),
            Some(TargetRef::package("standard", "pkgA")),
        );
        assert!(check_sanity(&action).is_empty());
        assert!(check_sanity(&action).is_empty());
    }

    #[test]
    fn test_uniqueness_flags_duplicates() {
        let one = submit(
            Some(SourceRef::package("home:alice", "pkgA")),
            Some(TargetRef::package("standard", "pkgA")),
        );
        let two = one.derived(crate::action::DerivePatch::default());
        let errors = check_uniqueness(&[one, two]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_uniqueness_exempts_add_role_and_incidents() {
        let mut one = RequestAction::new(ActionKind::AddRole).unwrap();
        one.target = Some(TargetRef::package("prj", "pkg"));
        let two = one.clone();
        assert!(check_uniqueness(&[one, two]).is_empty());
    }
}
