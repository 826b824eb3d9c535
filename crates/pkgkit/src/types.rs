//! Core types for package operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Something to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Package {
    /// A package from the configured repositories
    Name(String),
    /// A package file fetched from a URL (repository release RPMs)
    Url {
        /// Download location
        url: String,
        /// Installed package name, used to query installed state
        provides: String,
    },
}

impl Package {
    /// Create a repository package.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Create a URL package.
    pub fn url(url: impl Into<String>, provides: impl Into<String>) -> Self {
        Self::Url {
            url: url.into(),
            provides: provides.into(),
        }
    }

    /// Name to check installed state with.
    pub fn query_name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Url { provides, .. } => provides,
        }
    }

    /// Argument to hand to the package manager.
    pub fn install_arg(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Url { url, .. } => url,
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Url { provides, url } => write!(f, "{provides} ({url})"),
        }
    }
}

/// Result of a removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveOutcome {
    /// These packages were removed
    Removed(Vec<String>),
    /// Nothing to do
    AlreadyAbsent,
}

impl RemoveOutcome {
    /// Check if anything was removed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Removed(names) if !names.is_empty())
    }
}
