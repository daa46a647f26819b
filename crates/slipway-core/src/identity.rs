//! Identities: the acting user and reviewer references.

use crate::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The user on whose behalf an engine operation runs.
///
/// Permission checks and reviewer resolution always receive the actor
/// explicitly; the engine never reads an ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// Login of the acting user.
    pub login: String,
}

impl ActorContext {
    /// Create a context for the given login.
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }

    /// The name of this user's ephemeral branch project for `target`.
    ///
    /// A source project with this name is recognized as the user's own
    /// scaffolding branch of the target, which makes `cleanup` the implicit
    /// source-update policy on acceptance.
    #[must_use]
    pub fn branch_project_name(&self, target: &str) -> String {
        format!("home:{}:branches:{target}", self.login)
    }
}

/// A party whose review is solicited before a request may be accepted.
///
/// Reviews can be assigned to a concrete user or group, or delegated to
/// whoever maintains a package or project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by")]
pub enum Reviewer {
    /// Review by a named user.
    User {
        /// Login of the reviewing user.
        login: String,
    },
    /// Review by a named group.
    Group {
        /// Title of the reviewing group.
        title: String,
    },
    /// Review delegated to the maintainers of a package.
    Package {
        /// The package whose maintainers review.
        target: Endpoint,
    },
    /// Review delegated to the maintainers of a project.
    Project {
        /// Name of the project whose maintainers review.
        name: String,
    },
}

impl Reviewer {
    /// Review by user, by login.
    #[must_use]
    pub fn user(login: impl Into<String>) -> Self {
        Self::User {
            login: login.into(),
        }
    }

    /// Review by group, by title.
    #[must_use]
    pub fn group(title: impl Into<String>) -> Self {
        Self::Group {
            title: title.into(),
        }
    }

    /// Review by the maintainers of the given package.
    #[must_use]
    pub fn package(project: impl Into<String>, package: impl Into<String>) -> Self {
        Self::Package {
            target: Endpoint::package(project, package),
        }
    }

    /// Review by the maintainers of the given project.
    #[must_use]
    pub fn project(name: impl Into<String>) -> Self {
        Self::Project { name: name.into() }
    }
}

impl fmt::Display for Reviewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { login } => write!(f, "user:{login}"),
            Self::Group { title } => write!(f, "group:{title}"),
            Self::Package { target } => write!(f, "package:{target}"),
            Self::Project { name } => write!(f, "project:{name}"),
        }
    }
}
