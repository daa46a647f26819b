//! Wire-format projection of actions.
//!
//! The document tree mirrors the request interchange format: an `action`
//! element with `source`, `target`, `options`, `person`/`group` and the
//! output-only `acceptinfo`. Deserialization is strict; any unrecognized
//! field inside a sub-element is a fatal [`RequestError::MalformedAction`],
//! never silently ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::{
    AcceptInfo, ActionKind, RequestAction, SourceRef, SourceUpdatePolicy, TargetRef,
};
use crate::error::{RequestError, RequestResult};

/// The `source` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDocument {
    /// Source project.
    pub project: String,
    /// Source package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Pinned source revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// The `target` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDocument {
    /// Target project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Target package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Project an incident leg releases into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub releaseproject: Option<String>,
    /// Target repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// The `options` element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsDocument {
    /// Source-update policy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourceupdate: Option<String>,
    /// Whether to resolve the source link on acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updatelink: Option<bool>,
    /// Version-ordering hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub makeoriginolder: Option<bool>,
}

impl OptionsDocument {
    fn is_empty(&self) -> bool {
        self.sourceupdate.is_none() && self.updatelink.is_none() && self.makeoriginolder.is_none()
    }
}

/// The `person` or `group` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartyDocument {
    /// Login or title.
    pub name: String,
    /// Accompanying role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// The output-only `acceptinfo` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptInfoDocument {
    /// Accepted source revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Source checksum at acceptance.
    pub srcmd5: String,
    /// Source checksum before acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osrcmd5: Option<String>,
    /// Link-expanded source checksum at acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrcmd5: Option<String>,
    /// Link-expanded source checksum before acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxsrcmd5: Option<String>,
}

/// The `action` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDocument {
    /// Wire type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDocument>,
    /// Target element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDocument>,
    /// Options element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsDocument>,
    /// Person element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PartyDocument>,
    /// Group element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<PartyDocument>,
    /// Accept info element, present after acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptinfo: Option<AcceptInfoDocument>,
}

/// Parse an action from its serialized document.
///
/// # Errors
///
/// [`RequestError::MalformedAction`] for structural defects (including any
/// unknown field), [`RequestError::UnknownActionType`] for unregistered type
/// names, [`RequestError::UnsupportedLegacyAction`] for new `group` actions.
pub fn parse_action(json: &str) -> RequestResult<RequestAction> {
    let document: ActionDocument =
        serde_json::from_str(json).map_err(|e| RequestError::MalformedAction(e.to_string()))?;
    from_document(document)
}

/// Build an action from a deserialized document.
///
/// # Errors
///
/// See [`parse_action`].
pub fn from_document(document: ActionDocument) -> RequestResult<RequestAction> {
    let kind = ActionKind::from_wire_name(&document.kind)?;
    let mut action = RequestAction::new(kind)?;

    if let Some(source) = document.source {
        action.source = Some(SourceRef {
            project: source.project,
            package: source.package,
            rev: source.rev,
        });
    }
    if let Some(target) = document.target {
        action.target = Some(TargetRef {
            project: target.project.unwrap_or_default(),
            package: target.package,
            repository: target.repository,
            release_project: target.releaseproject,
        });
    }
    if let Some(options) = document.options {
        action.source_update = options
            .sourceupdate
            .as_deref()
            .map(SourceUpdatePolicy::from_wire_name)
            .transpose()?;
        action.update_link = options.updatelink.unwrap_or(false);
        action.make_origin_older = options.makeoriginolder.unwrap_or(false);
    }
    if let Some(person) = document.person {
        action.person = Some(person.name);
        action.role = person.role;
    }
    if let Some(group) = document.group {
        if action.role.is_some() && group.role.is_some() {
            return Err(RequestError::MalformedAction(
                "role already taken".to_string(),
            ));
        }
        action.group = Some(group.name);
        if let Some(role) = group.role {
            action.role = Some(role);
        }
    }
    if let Some(info) = document.acceptinfo {
        action.accept_info = Some(AcceptInfo {
            rev: info.rev,
            srcmd5: info.srcmd5,
            osrcmd5: info.osrcmd5,
            xsrcmd5: info.xsrcmd5,
            oxsrcmd5: info.oxsrcmd5,
        });
    }

    Ok(action)
}

/// Project an action onto the wire document.
#[must_use]
pub fn to_document(action: &RequestAction) -> ActionDocument {
    let source = action
        .source
        .as_ref()
        .map(|s| SourceDocument {
            project: s.project.clone(),
            package: s.package.clone(),
            rev: s.rev.clone(),
        });
    let target = action
        .target
        .as_ref()
        .map(|t| TargetDocument {
            project: (!t.project.is_empty()).then(|| t.project.clone()),
            package: t.package.clone(),
            releaseproject: t.release_project.clone(),
            repository: t.repository.clone(),
        });

    let options = OptionsDocument {
        sourceupdate: action.source_update.map(|p| p.wire_name().to_string()),
        updatelink: action.update_link.then_some(true),
        makeoriginolder: action.make_origin_older.then_some(true),
    };

    ActionDocument {
        kind: action.kind.wire_name().to_string(),
        source,
        target,
        options: (!options.is_empty()).then_some(options),
        person: action.person.as_ref().map(|name| PartyDocument {
            name: name.clone(),
            role: action.role.clone(),
        }),
        group: action.group.as_ref().map(|name| PartyDocument {
            name: name.clone(),
            role: action.person.is_none().then(|| action.role.clone()).flatten(),
        }),
        acceptinfo: action.accept_info.as_ref().map(|info| AcceptInfoDocument {
            rev: info.rev.clone(),
            srcmd5: info.srcmd5.clone(),
            osrcmd5: info.osrcmd5.clone(),
            xsrcmd5: info.xsrcmd5.clone(),
            oxsrcmd5: info.oxsrcmd5.clone(),
        }),
    }
}

/// Serialize an action to its wire document string.
///
/// # Errors
///
/// [`RequestError::MalformedAction`] if serialization fails.
pub fn render_action(action: &RequestAction) -> RequestResult<String> {
    serde_json::to_string(&to_document(action))
        .map_err(|e| RequestError::MalformedAction(e.to_string()))
}

/// The flattened notification payload of an action.
///
/// Null-valued fields are omitted. For `change_devel` actions the target
/// package defaults to the source package when otherwise unset.
#[must_use]
pub fn notify_params(action: &RequestAction) -> BTreeMap<&'static str, String> {
    let mut params = BTreeMap::new();
    params.insert("action_id", action.id.to_string());
    params.insert("type", action.kind.wire_name().to_string());

    let mut put = |key: &'static str, value: Option<&str>| {
        if let Some(value) = value {
            params.insert(key, value.to_string());
        }
    };
    put("sourceproject", action.source_project());
    put("sourcepackage", action.source_package());
    put(
        "sourcerevision",
        action.source.as_ref().and_then(|s| s.rev.as_deref()),
    );
    put("person", action.person.as_deref());
    put("group", action.group.as_deref());
    put("role", action.role.as_deref());
    put("targetproject", action.target_project());
    match action.target_package() {
        Some(package) => put("targetpackage", Some(package)),
        None if action.kind == ActionKind::ChangeDevel => {
            put("targetpackage", action.source_package());
        },
        None => {},
    }
    put(
        "targetrepository",
        action.target.as_ref().and_then(|t| t.repository.as_deref()),
    );
    put(
        "target_releaseproject",
        action
            .target
            .as_ref()
            .and_then(|t| t.release_project.as_deref()),
    );
    put(
        "sourceupdate",
        action.source_update.map(SourceUpdatePolicy::wire_name),
    );
    if action.make_origin_older {
        params.insert("makeoriginolder", "true".to_string());
    }
    params
}
