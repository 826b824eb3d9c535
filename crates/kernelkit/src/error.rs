//! Error types for the kernel build pipeline.
//!
//! Every pipeline error is fatal; the category only shapes the message the
//! user sees and the advice printed under it.

use crate::stage::Stage;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of build errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Download or API failure.
    Network,
    /// Release asset, tool or artifact not found.
    NotFound,
    /// Archive could not be read or written.
    Format,
    /// An external build command failed.
    Build,
    /// Configuration is incomplete or invalid.
    Config,
    /// Permission denied on the filesystem.
    Permission,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Required file not found",
            Self::Format => "Invalid archive",
            Self::Build => "Build command failed",
            Self::Config => "Invalid build configuration",
            Self::Permission => "Permission denied",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and the toolchain URL",
            Self::NotFound => "Check the toolchain layout and the configured image names",
            Self::Format => "The downloaded archive may be corrupted, try again",
            Self::Build => "Scroll up for the compiler output",
            Self::Config => "Review the [kernel] section of config.toml",
            Self::Permission => "Check permissions of the build directory",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while building a kernel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        message: String,
        status: Option<u16>,
    },

    /// Downloading the toolchain failed.
    #[error("download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    /// No release asset matched.
    #[error("no release asset of {repo} matches '{pattern}'")]
    NoMatchingAsset { repo: String, pattern: String },

    /// Invalid response from the releases API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Archive could not be unpacked or written.
    #[error("archive error: {0}")]
    Archive(String),

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required toolchain binary is absent or not executable.
    #[error("toolchain binary '{tool}' {reason} in {dir}")]
    ToolMissing {
        tool: String,
        reason: String,
        dir: PathBuf,
    },

    /// An external command of a stage failed.
    #[error("{stage} failed: {message}")]
    Command { stage: Stage, message: String },

    /// Compilation produced none of the expected images.
    #[error("no kernel image found in {dir} (looked for {})", .names.join(", "))]
    ArtifactMissing { dir: PathBuf, names: Vec<String> },

    /// Build configuration is invalid.
    #[error("invalid build configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a stage command error.
    pub fn command(stage: Stage, message: impl Into<String>) -> Self {
        Self::Command {
            stage,
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { .. } | Self::DownloadFailed { .. } => ErrorCategory::Network,
            Self::NoMatchingAsset { .. }
            | Self::ToolMissing { .. }
            | Self::ArtifactMissing { .. } => ErrorCategory::NotFound,
            Self::InvalidResponse(_) | Self::Archive(_) => ErrorCategory::Format,
            Self::Io { source, .. } => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    ErrorCategory::Permission
                } else {
                    ErrorCategory::Other
                }
            }
            Self::Command { .. } => ErrorCategory::Build,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::Http {
                message: "x".into(),
                status: Some(503)
            }
            .category(),
            ErrorCategory::Network
        );
        assert_eq!(
            Error::ArtifactMissing {
                dir: PathBuf::from("out"),
                names: vec!["Image".into()]
            }
            .category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::command(Stage::Compile, "exit 2").category(),
            ErrorCategory::Build
        );
        let denied = Error::io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_artifact_missing_message() {
        let err = Error::ArtifactMissing {
            dir: PathBuf::from("out/arch/arm64/boot"),
            names: vec!["Image.gz-dtb".into(), "Image".into()],
        };
        assert_eq!(
            err.to_string(),
            "no kernel image found in out/arch/arm64/boot (looked for Image.gz-dtb, Image)"
        );
    }

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Build.advice().is_empty());
        assert!(!ErrorCategory::Config.description().is_empty());
    }
}
