//! Service resource - systemd units enabled and running

use anyhow::Result;
use sequencer::{ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState};
use std::sync::Arc;

use super::run_checked;

/// A systemd unit that must be enabled and active
#[derive(Debug)]
pub struct SystemdService {
    unit: String,
    runner: Arc<dyn CommandRunner>,
}

impl SystemdService {
    pub fn new(unit: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            unit: unit.to_string(),
            runner,
        }
    }

    fn query(&self, verb: &str) -> Result<bool> {
        let spec = CommandSpec::new("systemctl").args([verb, "--quiet", self.unit.as_str()]);
        Ok(self.runner.run(&spec)?.success)
    }
}

impl Resource for SystemdService {
    fn id(&self) -> String {
        self.unit.clone()
    }

    fn description(&self) -> String {
        format!("Enable and start {}", self.unit)
    }

    fn resource_type(&self) -> &'static str {
        "service"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let enabled = self.query("is-enabled")?;
        let active = self.query("is-active")?;
        Ok(match (enabled, active) {
            (true, true) => ResourceState::Present { details: None },
            (false, false) => ResourceState::Absent,
            (enabled, _) => ResourceState::Modified {
                from: if enabled { "enabled, stopped" } else { "running, disabled" }.to_string(),
                to: "enabled, running".to_string(),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let spec = CommandSpec::new("systemctl")
            .args(["enable", "--now", self.unit.as_str()])
            .privileged();
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(ApplyResult::Modified)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already running".to_string())
    }
}
