//! Firewall resources - firewalld default zone, ufw enabled with deny incoming

use anyhow::Result;
use sequencer::{ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState};
use std::sync::Arc;

use super::run_checked;

/// firewalld default zone
#[derive(Debug)]
pub struct FirewalldZone {
    zone: String,
    runner: Arc<dyn CommandRunner>,
}

impl FirewalldZone {
    pub fn new(zone: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            zone: zone.to_string(),
            runner,
        }
    }
}

impl Resource for FirewalldZone {
    fn id(&self) -> String {
        format!("firewalld:{}", self.zone)
    }

    fn description(&self) -> String {
        format!("Set firewalld default zone to {}", self.zone)
    }

    fn resource_type(&self) -> &'static str {
        "firewall"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let spec = CommandSpec::new("firewall-cmd").arg("--get-default-zone");
        let output = self.runner.run(&spec)?;
        if !output.success {
            return Ok(ResourceState::Absent);
        }
        let current = output.stdout_str().trim().to_string();
        Ok(if current == self.zone {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Modified {
                from: current,
                to: self.zone.clone(),
            }
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let spec = CommandSpec::new("firewall-cmd")
            .arg(format!("--set-default-zone={}", self.zone))
            .privileged();
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(ApplyResult::Modified)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already configured".to_string())
    }
}

/// ufw active, denying incoming connections by default
#[derive(Debug)]
pub struct UfwEnabled {
    runner: Arc<dyn CommandRunner>,
}

impl UfwEnabled {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Resource for UfwEnabled {
    fn id(&self) -> String {
        "ufw".to_string()
    }

    fn description(&self) -> String {
        "Enable ufw (deny incoming)".to_string()
    }

    fn resource_type(&self) -> &'static str {
        "firewall"
    }

    fn current_state(&self) -> Result<ResourceState> {
        // ufw status needs root
        let spec = CommandSpec::new("ufw").args(["status", "verbose"]).privileged();
        let output = self.runner.run(&spec)?;
        let status = output.stdout_str();
        let active = status.lines().any(|l| l.trim() == "Status: active");
        let denies = status.contains("deny (incoming)");
        Ok(match (active, denies) {
            (true, true) => ResourceState::Present { details: None },
            (true, false) => ResourceState::Modified {
                from: "active, incoming allowed".to_string(),
                to: "active, incoming denied".to_string(),
            },
            (false, _) => ResourceState::Absent,
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let deny = CommandSpec::new("ufw")
            .args(["default", "deny", "incoming"])
            .privileged();
        run_checked(self.runner.as_ref(), &deny)?;
        let enable = CommandSpec::new("ufw").args(["--force", "enable"]).privileged();
        run_checked(self.runner.as_ref(), &enable)?;
        Ok(ApplyResult::Modified)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already active".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer::{CommandOutput, ScriptedRunner};

    #[test]
    fn test_firewalld_zone() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(&["firewall-cmd", "--get-default-zone"], CommandOutput::ok("FedoraWorkstation\n"));
        let zone = FirewalldZone::new("public", runner.clone());
        assert_eq!(
            zone.current_state().unwrap(),
            ResourceState::Modified {
                from: "FedoraWorkstation".into(),
                to: "public".into()
            }
        );
        zone.apply(&mut ApplyContext::default()).unwrap();
        assert_eq!(
            runner.command_lines().last().unwrap(),
            "firewall-cmd --set-default-zone=public"
        );
    }

    #[test]
    fn test_ufw_states() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            &["ufw", "status"],
            CommandOutput::ok("Status: active\nLogging: on (low)\nDefault: deny (incoming), allow (outgoing), disabled (routed)\n"),
        );
        assert!(!UfwEnabled::new(runner).needs_apply().unwrap());

        let runner = Arc::new(ScriptedRunner::new());
        runner.on(&["ufw", "status"], CommandOutput::ok("Status: inactive\n"));
        let ufw = UfwEnabled::new(runner.clone());
        assert_eq!(ufw.current_state().unwrap(), ResourceState::Absent);
        ufw.apply(&mut ApplyContext::default()).unwrap();
        let lines = runner.command_lines();
        assert_eq!(lines[lines.len() - 2], "ufw default deny incoming");
        assert_eq!(lines[lines.len() - 1], "ufw --force enable");
    }
}
