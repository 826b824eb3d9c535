//! System upgrade resource

use anyhow::Result;
use pkgkit::Client;
use sequencer::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::sync::Arc;

/// All installed packages at their latest version
#[derive(Debug)]
pub struct SystemUpgrade {
    client: Arc<Client>,
}

impl SystemUpgrade {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl Resource for SystemUpgrade {
    fn id(&self) -> String {
        "system".to_string()
    }

    fn description(&self) -> String {
        format!("Upgrade all packages with {}", self.client.manager().name())
    }

    fn resource_type(&self) -> &'static str {
        "upgrade"
    }

    fn current_state(&self) -> Result<ResourceState> {
        self.client.refresh()?;
        match self.client.pending_upgrades()? {
            0 => Ok(ResourceState::Present { details: None }),
            n => Ok(ResourceState::Modified {
                from: format!("{n} pending"),
                to: "up to date".to_string(),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.client.upgrade()?;
        Ok(ApplyResult::Modified)
    }

    fn converged_note(&self) -> Option<String> {
        Some("up to date".to_string())
    }
}
