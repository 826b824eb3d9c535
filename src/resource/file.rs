//! Config file resource - whole-file content written with elevated rights

use anyhow::{Context, Result};
use sequencer::{ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState};
use std::path::PathBuf;
use std::sync::Arc;

use super::run_checked;

/// A system file that must have exactly `content`
///
/// The content is computed when the plan is built (for example the package
/// manager config with tuning applied), so re-running converges to a no-op.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    content: String,
    description: String,
    runner: Arc<dyn CommandRunner>,
}

impl ConfigFile {
    pub fn new(
        path: impl Into<PathBuf>,
        content: String,
        description: &str,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            path: path.into(),
            content,
            description: description.to_string(),
            runner,
        }
    }
}

impl Resource for ConfigFile {
    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn resource_type(&self) -> &'static str {
        "config_file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.exists() {
            return Ok(ResourceState::Absent);
        }
        let current = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read {}", self.path.display()))?;
        if current == self.content {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: "current".to_string(),
                to: "tuned".to_string(),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.path.exists();
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            let mkdir = CommandSpec::new("mkdir")
                .arg("-p")
                .arg(parent.display().to_string())
                .privileged();
            run_checked(self.runner.as_ref(), &mkdir)?;
        }
        let tee = CommandSpec::new("tee")
            .arg(self.path.display().to_string())
            .stdin(self.content.clone())
            .privileged();
        run_checked(self.runner.as_ref(), &tee)?;
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }

    fn converged_note(&self) -> Option<String> {
        Some("already configured".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer::ScriptedRunner;
    use tempfile::TempDir;

    #[test]
    fn test_matching_content_is_converged() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dnf.conf");
        std::fs::write(&path, "[main]\nmax_parallel_downloads=10\n").unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let file = ConfigFile::new(
            &path,
            "[main]\nmax_parallel_downloads=10\n".to_string(),
            "Tune dnf",
            runner.clone(),
        );
        assert!(!file.needs_apply().unwrap());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_write_goes_through_tee() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zram-generator.conf");
        let runner = Arc::new(ScriptedRunner::new());
        let file = ConfigFile::new(&path, "[zram0]\n".to_string(), "Enable zram", runner.clone());

        assert_eq!(file.current_state().unwrap(), ResourceState::Absent);
        let result = file.apply(&mut ApplyContext::default()).unwrap();
        assert_eq!(result, ApplyResult::Created);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].argv(), vec!["tee".to_string(), path.display().to_string()]);
        assert_eq!(calls[0].stdin.as_deref(), Some(b"[zram0]\n".as_slice()));
        assert!(calls[0].privileged);
    }

    #[test]
    fn test_missing_parent_is_created() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("apt.conf.d/99postinstall");
        let runner = Arc::new(ScriptedRunner::new());
        let file = ConfigFile::new(&path, "x\n".to_string(), "Tune apt", runner.clone());
        file.apply(&mut ApplyContext::default()).unwrap();
        assert_eq!(runner.count_matching(&["mkdir", "-p"]), 1);
        assert_eq!(runner.count_matching(&["tee"]), 1);
    }
}
