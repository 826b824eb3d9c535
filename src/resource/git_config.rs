//! Git global config resource, applied as the desktop user

use anyhow::Result;
use sequencer::{
    ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState, RunAs,
};
use std::sync::Arc;

use super::run_checked;

/// Read a global Git config value as `user`; unset keys yield None
pub fn read_global(runner: &dyn CommandRunner, user: &RunAs, key: &str) -> Result<Option<String>> {
    let spec = CommandSpec::new("git")
        .args(["config", "--global", "--get", key])
        .run_as(user.clone());
    let output = runner.run(&spec)?;
    // `git config --get` exits 1 for an unset key
    if !output.success {
        return Ok(None);
    }
    let value = output.stdout_str().trim().to_string();
    Ok((!value.is_empty()).then_some(value))
}

/// One `git config --global` key
#[derive(Debug)]
pub struct GitConfigValue {
    key: String,
    value: String,
    user: RunAs,
    runner: Arc<dyn CommandRunner>,
}

impl GitConfigValue {
    pub fn new(key: &str, value: &str, user: RunAs, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            user,
            runner,
        }
    }
}

impl Resource for GitConfigValue {
    fn id(&self) -> String {
        self.key.clone()
    }

    fn description(&self) -> String {
        format!("Set git {} for {}", self.key, self.user.user)
    }

    fn resource_type(&self) -> &'static str {
        "git_config"
    }

    fn current_state(&self) -> Result<ResourceState> {
        match read_global(self.runner.as_ref(), &self.user, &self.key)? {
            Some(current) if current == self.value => Ok(ResourceState::Present { details: None }),
            Some(current) => Ok(ResourceState::Modified {
                from: current,
                to: self.value.clone(),
            }),
            None => Ok(ResourceState::Absent),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = read_global(self.runner.as_ref(), &self.user, &self.key)?.is_some();
        let spec = CommandSpec::new("git")
            .args(["config", "--global", self.key.as_str(), self.value.as_str()])
            .run_as(self.user.clone());
        run_checked(self.runner.as_ref(), &spec)?;
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
