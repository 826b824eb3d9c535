//! Error types for desktop operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing or configuring the desktop.
#[derive(Debug, Error)]
pub enum Error {
    /// No passwd entry for the requested user
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// No passwd entry for the requested uid
    #[error("no user with uid {0}")]
    UnknownUid(u32),

    /// A uid value could not be parsed
    #[error("invalid uid '{value}' in {variable}")]
    InvalidUid {
        /// Environment variable holding the value
        variable: String,
        /// Offending value
        value: String,
    },

    /// The system user database returned an error
    #[error("user database lookup failed: {0}")]
    UserLookup(#[source] std::io::Error),

    /// A passwd file could not be read
    #[error("failed to read {path}: {source}")]
    Passwd {
        /// File that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A settings command failed
    #[error("{command} failed: {stderr}")]
    Command {
        /// Command line
        command: String,
        /// Standard error output
        stderr: String,
    },
}

/// Result type for desktop operations.
pub type Result<T> = std::result::Result<T, Error>;
