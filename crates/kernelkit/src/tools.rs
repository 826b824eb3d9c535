//! Toolchain verification.

use crate::error::{Error, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Check that every tool exists in `bin_dir` and is executable.
///
/// Returns the resolved paths in the order given.
pub fn verify_tools(bin_dir: &Path, tools: &[String]) -> Result<Vec<PathBuf>> {
    tools
        .iter()
        .map(|tool| {
            let missing = |reason: &str| Error::ToolMissing {
                tool: tool.clone(),
                reason: reason.to_string(),
                dir: bin_dir.to_path_buf(),
            };
            let path = bin_dir.join(tool);
            let metadata = std::fs::metadata(&path).map_err(|_| missing("not found"))?;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(missing("is not executable"));
            }
            which::which_in(tool, Some(bin_dir), bin_dir).map_err(|_| missing("not found"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_tool(dir: &Path, name: &str, mode: u32) {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_all_present() {
        let temp = TempDir::new().unwrap();
        write_tool(temp.path(), "clang", 0o755);
        write_tool(temp.path(), "ld.lld", 0o755);

        let found = verify_tools(temp.path(), &["clang".into(), "ld.lld".into()]).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("clang"));
    }

    #[test]
    fn test_missing_tool() {
        let temp = TempDir::new().unwrap();
        write_tool(temp.path(), "clang", 0o755);

        let err = verify_tools(temp.path(), &["clang".into(), "ld.lld".into()]).unwrap_err();
        assert!(matches!(err, Error::ToolMissing { ref tool, .. } if tool == "ld.lld"));
        assert!(err.to_string().contains("'ld.lld' not found"));
    }

    #[test]
    fn test_not_executable() {
        let temp = TempDir::new().unwrap();
        write_tool(temp.path(), "clang", 0o644);

        let err = verify_tools(temp.path(), &["clang".into()]).unwrap_err();
        assert!(err.to_string().contains("is not executable"));
    }
}
