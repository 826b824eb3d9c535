//! GNOME Shell extensions built from their git repositories

use anyhow::{Context, Result, bail};
use sequencer::{
    ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState, RunAs,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::run_checked;
use crate::schema::ExtensionSource;

/// Clones live here, relative to the desktop user's home
pub const CLONE_ROOT: &str = ".cache/postinstall/extensions";

/// Directory name for an extension clone
///
/// `dash-to-dock@micxgx.gmail.com` is kept as is. Separators and other
/// characters become `-`, and names made only of dots become `extension`.
pub fn clone_dir_name(uuid: &str) -> String {
    let name: String = uuid
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "-_.@".contains(c) {
                c
            } else {
                '-'
            }
        })
        .collect();
    if name.trim_matches('.').is_empty() {
        "extension".to_string()
    } else {
        name
    }
}

/// An installed GNOME Shell extension
#[derive(Debug)]
pub struct GnomeExtension {
    source: ExtensionSource,
    clone_dir: PathBuf,
    user: RunAs,
    runner: Arc<dyn CommandRunner>,
}

impl GnomeExtension {
    pub fn new(
        source: &ExtensionSource,
        home: &Path,
        user: RunAs,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            clone_dir: home.join(CLONE_ROOT).join(clone_dir_name(&source.uuid)),
            source: source.clone(),
            user,
            runner,
        }
    }

    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program).run_as(self.user.clone())
    }

    /// Fresh shallow clone; a leftover clone from an earlier run is removed
    fn fetch(&self) -> Result<()> {
        if self.clone_dir.exists() {
            log::debug!("removing existing {}", self.clone_dir.display());
            std::fs::remove_dir_all(&self.clone_dir)
                .with_context(|| format!("Could not remove {}", self.clone_dir.display()))?;
        }
        let mut spec = self.command("git").args(["clone", "--depth=1"]);
        if let Some(branch) = &self.source.branch {
            spec = spec.args(["--branch", branch.as_str()]);
        }
        let spec = spec
            .arg(&self.source.repo)
            .arg(self.clone_dir.display().to_string());
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(())
    }

    fn build(&self) -> Result<()> {
        let Some((program, args)) = self.source.build.split_first() else {
            bail!("No build command for {}", self.source.uuid);
        };
        let spec = self.command(program).args(args).cwd(&self.clone_dir);
        run_checked(self.runner.as_ref(), &spec)
            .with_context(|| format!("Building {} failed", self.source.uuid))?;
        Ok(())
    }
}

impl Resource for GnomeExtension {
    fn id(&self) -> String {
        self.source.uuid.clone()
    }

    fn description(&self) -> String {
        format!("Build and install {} from {}", self.source.uuid, self.source.repo)
    }

    fn resource_type(&self) -> &'static str {
        "gnome_extension"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let spec = self.command("gnome-extensions").arg("list");
        let output = self.runner.run(&spec)?;
        if !output.success {
            log::debug!("gnome-extensions list failed: {}", output.stderr_str().trim());
            return Ok(ResourceState::Absent);
        }
        let installed = output
            .stdout_str()
            .lines()
            .any(|line| line.trim() == self.source.uuid);
        Ok(if installed {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.fetch()?;
        self.build()?;

        // The shell only sees new extensions after the next login
        let enable = self.command("gnome-extensions").args(["enable", self.source.uuid.as_str()]);
        match self.runner.run(&enable) {
            Ok(output) if output.success => {}
            Ok(output) => log::warn!(
                "{} installed; enable it after logging in again ({})",
                self.source.uuid,
                output.stderr_str().trim()
            ),
            Err(e) => log::warn!("{} installed but not enabled: {e:#}", self.source.uuid),
        }
        Ok(ApplyResult::Created)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already installed".to_string())
    }
}
