//! Source/target endpoints.
//!
//! An [`Endpoint`] names one side of an action: a project, optionally
//! narrowed to a single package. Components that need to treat "the source
//! side" and "the target side" uniformly take a [`Direction`] and resolve it
//! through a direction-free accessor instead of duplicating per-side code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of an action an endpoint refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The side the change originates from.
    Source,
    /// The side the change is applied to.
    Target,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// A project, optionally narrowed to one package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Project name.
    pub project: String,
    /// Package name, if the endpoint is package-scoped.
    pub package: Option<String>,
}

impl Endpoint {
    /// Create a package-scoped endpoint.
    #[must_use]
    pub fn package(project: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: Some(package.into()),
        }
    }

    /// Create a project-scoped endpoint.
    #[must_use]
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: None,
        }
    }

    /// Check whether this endpoint names exactly the given project/package pair.
    #[must_use]
    pub fn matches(&self, project: &str, package: &str) -> bool {
        self.project == project && self.package.as_deref() == Some(package)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{}/{package}", self.project),
            None => write!(f, "{}", self.project),
        }
    }
}
