//! Flatpak resources - system remote and applications

use anyhow::Result;
use sequencer::{ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState};
use std::sync::Arc;

use super::run_checked;

/// A configured system-wide Flatpak remote
#[derive(Debug)]
pub struct FlatpakRemote {
    name: String,
    url: String,
    runner: Arc<dyn CommandRunner>,
}

impl FlatpakRemote {
    pub fn new(name: &str, url: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            runner,
        }
    }
}

impl Resource for FlatpakRemote {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Add Flatpak remote {} ({})", self.name, self.url)
    }

    fn resource_type(&self) -> &'static str {
        "flatpak_remote"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let spec = CommandSpec::new("flatpak").args(["remotes", "--system", "--columns=name"]);
        let output = self.runner.run(&spec)?;
        if !output.success {
            // No flatpak yet, or no remotes configured
            return Ok(ResourceState::Absent);
        }
        let present = output
            .stdout_str()
            .lines()
            .any(|line| line.trim() == self.name);
        Ok(if present {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let spec = CommandSpec::new("flatpak")
            .args(["remote-add", "--system", "--if-not-exists"])
            .arg(&self.name)
            .arg(&self.url)
            .privileged();
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(ApplyResult::Created)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already configured".to_string())
    }
}

/// A system-wide Flatpak application
#[derive(Debug)]
pub struct FlatpakApp {
    remote: String,
    app_id: String,
    runner: Arc<dyn CommandRunner>,
}

impl FlatpakApp {
    pub fn new(remote: &str, app_id: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            remote: remote.to_string(),
            app_id: app_id.to_string(),
            runner,
        }
    }
}

impl Resource for FlatpakApp {
    fn id(&self) -> String {
        self.app_id.clone()
    }

    fn description(&self) -> String {
        format!("Install {} from {}", self.app_id, self.remote)
    }

    fn resource_type(&self) -> &'static str {
        "flatpak_app"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let spec = CommandSpec::new("flatpak").args(["info", "--system", self.app_id.as_str()]);
        let output = self.runner.run(&spec)?;
        Ok(if output.success {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let spec = CommandSpec::new("flatpak")
            .args(["install", "--system", "--noninteractive", "-y"])
            .arg(&self.remote)
            .arg(&self.app_id)
            .privileged();
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(ApplyResult::Created)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already installed".to_string())
    }
}
