//! Scoped sudo context
//!
//! Sudo is never held for longer than the run that needs it:
//! 1. The plan is built first (reads only, no sudo needed)
//! 2. Sudo is validated once before privileged steps run
//! 3. The timestamp is invalidated when the context is dropped
//!
//! When the process already runs as root no context is needed.

use anyhow::{Context, Result, bail};
use std::process::Command;

/// Scoped sudo context - automatically invalidates on drop
pub struct SudoContext {
    _private: (),
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to user
    pub fn acquire(reason: &str) -> Result<Self> {
        eprintln!();
        eprintln!("  Sudo required: {reason}");
        eprintln!();

        let status = Command::new("sudo")
            .arg("-v")
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        Ok(Self { _private: () })
    }

    /// Acquire only when not root; `None` means no sudo is needed.
    pub fn acquire_unless_root(is_root: bool, reason: &str) -> Result<Option<Self>> {
        if is_root {
            return Ok(None);
        }
        Self::acquire(reason).map(Some)
    }

    /// Check if sudo is currently valid (without prompting)
    pub fn is_valid() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .status()
            .is_ok_and(|s| s.success())
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        let _ = Command::new("sudo").arg("-k").status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_needs_no_context() {
        assert!(SudoContext::acquire_unless_root(true, "test").unwrap().is_none());
    }
}
