//! Desktop setting resource, read and written as the desktop user

use anyhow::Result;
use deskkit::Setting;
use deskkit::backend::normalize;
use sequencer::{
    ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState, RunAs,
};
use std::sync::Arc;

use super::run_checked;

/// One settings-daemon key for a preference
///
/// `user` carries the session bus address, so the read and write commands
/// reach the running desktop session even when postinstall runs as root.
#[derive(Debug)]
pub struct DesktopSetting {
    preference: String,
    setting: Setting,
    user: RunAs,
    runner: Arc<dyn CommandRunner>,
}

impl DesktopSetting {
    pub fn new(
        preference: &str,
        setting: Setting,
        user: RunAs,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            preference: preference.to_string(),
            setting,
            user,
            runner,
        }
    }

    fn as_user(&self, spec: &CommandSpec) -> CommandSpec {
        spec.clone().run_as(self.user.clone())
    }

    /// Raw current value; an unset or unreadable key reads as empty
    fn read(&self) -> Result<String> {
        let output = self.runner.run(&self.as_user(&self.setting.read))?;
        if output.success {
            Ok(output.stdout_str().trim().to_string())
        } else {
            log::debug!(
                "{}: read failed: {}",
                self.setting.key,
                output.stderr_str().trim()
            );
            Ok(String::new())
        }
    }
}

impl Resource for DesktopSetting {
    fn id(&self) -> String {
        self.setting.key.clone()
    }

    fn description(&self) -> String {
        format!("{} ({})", self.preference, self.setting.key)
    }

    fn resource_type(&self) -> &'static str {
        "desktop_setting"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let current = self.read()?;
        if self.setting.is_satisfied(&current) {
            return Ok(ResourceState::Present { details: None });
        }
        if current.is_empty() {
            return Ok(ResourceState::Absent);
        }
        Ok(ResourceState::Modified {
            from: normalize(&current),
            to: normalize(&self.setting.target_value(&current)),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let current = self.read()?;
        let write = self.as_user(&self.setting.write_command(&current));
        run_checked(self.runner.as_ref(), &write)?;
        Ok(if current.is_empty() {
            ApplyResult::Created
        } else {
            ApplyResult::Modified
        })
    }

    fn converged_note(&self) -> Option<String> {
        Some("already set".to_string())
    }
}

/// A preference the desktop has no mapping for; recorded as skipped
#[derive(Debug)]
pub struct UnmappedPreference {
    reason: String,
}

impl UnmappedPreference {
    pub fn new(unmapped: &deskkit::Unmapped) -> Self {
        Self {
            reason: unmapped.to_string(),
        }
    }
}

impl Resource for UnmappedPreference {
    fn id(&self) -> String {
        self.reason.clone()
    }

    fn description(&self) -> String {
        self.reason.clone()
    }

    fn resource_type(&self) -> &'static str {
        "desktop_setting"
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(ResourceState::Unknown)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::Skipped {
            reason: self.reason.clone(),
        })
    }
}
