//! Centralized path resolution for postinstall
//!
//! # Environment Variables
//!
//! - `POSTINSTALL_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/postinstall`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `POSTINSTALL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/postinstall` (if set)
//! 3. `~/.config/postinstall`
//!
//! Under `sudo`, `HOME` may point at root's home; the config of the invoking
//! user is found through `POSTINSTALL_CONFIG_DIR` or `sudo -E`.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "POSTINSTALL_CONFIG_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the postinstall config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR)
        && !dir.is_empty()
    {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        let path = PathBuf::from(xdg_config).join("postinstall");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("postinstall");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `key` set (or removed), restoring it afterwards.
    ///
    /// Environment mutation is process-wide; only one test here touches each
    /// variable.
    fn with_env_var<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: each variable is only mutated by a single test
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_resolution_order() {
        with_env_var(ENV_CONFIG_DIR, Some("/custom/config/path"), || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/config/path"));
        });
        with_env_var(ENV_CONFIG_DIR, None, || {
            with_env_var("XDG_CONFIG_HOME", Some("/tmp/xdg-config-test"), || {
                assert_eq!(
                    config_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-config-test/postinstall")
                );
                assert_eq!(
                    config_file().unwrap(),
                    PathBuf::from("/tmp/xdg-config-test/postinstall/config.toml")
                );
            });
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_POSTINSTALL/file");
        assert_eq!(
            result,
            PathBuf::from("/path/$NONEXISTENT_VAR_POSTINSTALL/file")
        );
    }
}
