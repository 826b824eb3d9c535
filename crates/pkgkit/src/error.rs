//! Error types for package-manager operations.
//!
//! Errors are categorized from exit code and stderr so callers can tell
//! "nothing to do" apart from real failures and give useful advice.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of package-manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Target package is not installed
    NotInstalled,
    /// Package not found in any configured repository
    NotFound,
    /// Mirror or network problem
    Network,
    /// Another package manager instance holds the lock
    Locked,
    /// Permission denied (not root)
    Permission,
    /// Distribution not supported
    Unsupported,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error means the requested state already holds.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotInstalled)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotInstalled => "Package not installed",
            Self::NotFound => "Package not found",
            Self::Network => "Network connectivity issue",
            Self::Locked => "Package manager is busy",
            Self::Permission => "Permission denied",
            Self::Unsupported => "Unsupported distribution",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotInstalled => "No action needed - package is already absent",
            Self::NotFound => "Verify the package name or enable the repository that provides it",
            Self::Network => "Check your internet connection and mirror configuration",
            Self::Locked => "Wait for the other package manager process to finish",
            Self::Permission => "Run as root or make sure sudo is available",
            Self::Unsupported => "Install packages manually with your distribution's tools",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during package-manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// /etc/os-release is missing or has no ID
    #[error("cannot determine distribution from {path}: {reason}")]
    UnknownDistro {
        /// File that was read
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Distribution detected but not supported
    #[error("unsupported distribution: {0}")]
    Unsupported(String),

    /// Package not installed
    #[error("not installed: {name}")]
    NotInstalled {
        /// Name of the package
        name: String,
    },

    /// Package not found in repositories
    #[error("package not found: {name}")]
    NotFound {
        /// Name of the package
        name: String,
    },

    /// Network-related error
    #[error("network error: {message}")]
    Network {
        /// Detailed message from the package manager
        message: String,
    },

    /// Lock held by another process
    #[error("package manager locked: {message}")]
    Locked {
        /// Detailed message from the package manager
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Detailed message from the package manager
        message: String,
    },

    /// Command execution failed
    #[error("{message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// The command could not be started
    #[error("failed to run {program}: {message}")]
    Spawn {
        /// Program that was run
        program: String,
        /// Underlying error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotInstalled { .. } => ErrorCategory::NotInstalled,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Network { .. } => ErrorCategory::Network,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Unsupported(_) | Error::UnknownDistro { .. } => ErrorCategory::Unsupported,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Create an error from package-manager output.
    ///
    /// `manager` is the program name (`dnf`, `apt-get`, `pacman`, `zypper`);
    /// zypper signals a missing capability through the exit code alone.
    pub fn from_output(
        manager: &str,
        code: Option<i32>,
        stderr: &str,
        package: Option<&str>,
    ) -> Self {
        let lower = stderr.to_lowercase();
        let name = package.unwrap_or("unknown").to_string();

        if lower.contains("is not installed") || lower.contains("no packages marked for removal")
        {
            return Error::NotInstalled { name };
        }

        // zypper: ZYPPER_EXIT_INF_CAP_NOT_FOUND
        if (manager == "zypper" && code == Some(104))
            || lower.contains("target not found")
            || lower.contains("no match for argument")
            || lower.contains("unable to locate package")
            || lower.contains("has no installation candidate")
            || lower.contains("not found in package names")
        {
            return Error::NotFound { name };
        }

        if lower.contains("could not resolve")
            || lower.contains("temporary failure")
            || lower.contains("failed to download")
            || lower.contains("curl error")
            || lower.contains("timed out")
            || lower.contains("cannot download")
            || lower.contains("failed to retrieve")
        {
            return Error::Network {
                message: stderr.trim().to_string(),
            };
        }

        if lower.contains("could not get lock")
            || lower.contains("unable to lock database")
            || lower.contains("system management is locked")
            || lower.contains("waiting for process")
        {
            return Error::Locked {
                message: stderr.trim().to_string(),
            };
        }

        if lower.contains("permission denied")
            || lower.contains("are you root")
            || lower.contains("you need to be root")
            || lower.contains("must be run as root")
            || lower.contains("root privileges")
        {
            return Error::Permission {
                message: stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: format!(
                "{manager} failed{}{}",
                package.map(|n| format!(" for {n}")).unwrap_or_default(),
                code.map(|c| format!(" (exit {c})")).unwrap_or_default()
            ),
            stderr: stderr.trim().to_string(),
        }
    }

    /// Create an error from the output of a removal.
    ///
    /// A removal target the manager cannot find is already absent.
    pub fn from_remove_output(
        manager: &str,
        code: Option<i32>,
        stderr: &str,
        package: Option<&str>,
    ) -> Self {
        match Self::from_output(manager, code, stderr, package) {
            Error::NotFound { name } => Error::NotInstalled { name },
            other => other,
        }
    }
}

/// Result type for package-manager operations.
pub type Result<T> = std::result::Result<T, Error>;
