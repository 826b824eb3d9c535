//! Distribution detection from `/etc/os-release`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Default location of the os-release file.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Supported distribution identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroId {
    /// Fedora (dnf)
    Fedora,
    /// Arch Linux (pacman)
    Arch,
    /// Manjaro (pacman)
    Manjaro,
    /// Ubuntu (apt)
    Ubuntu,
    /// Debian (apt)
    Debian,
    /// openSUSE Leap / Tumbleweed (zypper)
    OpenSuse,
    /// Anything else; carries the raw `ID`
    Unsupported(String),
}

impl DistroId {
    /// Match a single os-release identifier.
    fn from_token(token: &str) -> Option<Self> {
        let token = token.to_lowercase();
        let id = match token.as_str() {
            "fedora" => Self::Fedora,
            "arch" | "archlinux" => Self::Arch,
            "manjaro" | "manjaro-arm" => Self::Manjaro,
            "ubuntu" => Self::Ubuntu,
            "debian" => Self::Debian,
            t if t == "suse" || t.starts_with("opensuse") => Self::OpenSuse,
            _ => return None,
        };
        Some(id)
    }

    /// Short name used in config and logs.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fedora => "fedora",
            Self::Arch => "arch",
            Self::Manjaro => "manjaro",
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::OpenSuse => "opensuse",
            Self::Unsupported(id) => id,
        }
    }

    /// Check if this is a supported distribution.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for DistroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What was learned about the running distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroProfile {
    /// Resolved identifier
    pub id: DistroId,
    /// Raw `ID` value
    pub raw_id: String,
    /// `VERSION_ID`, if present
    pub version_id: Option<String>,
    /// `PRETTY_NAME`, falling back to the raw ID
    pub pretty_name: String,
}

impl DistroProfile {
    /// Read and resolve the os-release file at `path`.
    ///
    /// A missing file or a file without `ID` is an error; an unknown ID
    /// yields [`DistroId::Unsupported`].
    pub fn detect(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::UnknownDistro {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).ok_or_else(|| Error::UnknownDistro {
            path: path.to_path_buf(),
            reason: "no ID field".to_string(),
        })
    }

    /// Resolve os-release content. Returns None when `ID` is missing.
    pub fn parse(content: &str) -> Option<Self> {
        let fields = parse_os_release(content);
        let raw_id = fields.get("ID").filter(|s| !s.is_empty())?.clone();

        let id = DistroId::from_token(&raw_id)
            .or_else(|| {
                fields
                    .get("ID_LIKE")
                    .into_iter()
                    .flat_map(|like| like.split_whitespace())
                    .find_map(DistroId::from_token)
            })
            .unwrap_or_else(|| DistroId::Unsupported(raw_id.clone()));

        Some(Self {
            id,
            version_id: fields.get("VERSION_ID").cloned(),
            pretty_name: fields
                .get("PRETTY_NAME")
                .cloned()
                .unwrap_or_else(|| raw_id.clone()),
            raw_id,
        })
    }

    /// Major version, for URL templates (`{version}`).
    pub fn version(&self) -> &str {
        self.version_id.as_deref().unwrap_or("")
    }
}

/// Parse `KEY=value` lines, stripping optional quotes and skipping comments.
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}
