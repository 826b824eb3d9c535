//! System-wide crypto policy (Fedora `update-crypto-policies`)

use anyhow::Result;
use sequencer::{ApplyContext, ApplyResult, CommandRunner, CommandSpec, Resource, ResourceState};
use std::sync::Arc;

use super::run_checked;

#[derive(Debug)]
pub struct CryptoPolicy {
    policy: String,
    runner: Arc<dyn CommandRunner>,
}

impl CryptoPolicy {
    pub fn new(policy: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            policy: policy.to_string(),
            runner,
        }
    }
}

impl Resource for CryptoPolicy {
    fn id(&self) -> String {
        self.policy.clone()
    }

    fn description(&self) -> String {
        format!("Set crypto policy {}", self.policy)
    }

    fn resource_type(&self) -> &'static str {
        "crypto_policy"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let spec = CommandSpec::new("update-crypto-policies").arg("--show");
        let current = run_checked(self.runner.as_ref(), &spec)?
            .stdout_str()
            .trim()
            .to_string();
        Ok(if current == self.policy {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Modified {
                from: current,
                to: self.policy.clone(),
            }
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let spec = CommandSpec::new("update-crypto-policies")
            .args(["--set", self.policy.as_str()])
            .privileged();
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(ApplyResult::Modified)
    }

    fn converged_note(&self) -> Option<String> {
        Some("already set".to_string())
    }
}
