//! Package resources - install and remove through the distro package manager

use anyhow::Result;
use pkgkit::{Client, Package};
use sequencer::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::sync::Arc;

/// A package that must be installed
#[derive(Debug)]
pub struct PackageInstall {
    client: Arc<Client>,
    package: Package,
}

impl PackageInstall {
    pub fn new(client: Arc<Client>, package: Package) -> Self {
        Self { client, package }
    }
}

impl Resource for PackageInstall {
    fn id(&self) -> String {
        self.package.query_name().to_string()
    }

    fn description(&self) -> String {
        format!("Install {}", self.package)
    }

    fn resource_type(&self) -> &'static str {
        match self.package {
            Package::Name(_) => "package",
            Package::Url { .. } => "repository",
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.client.is_installed(self.package.query_name())? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let installed = self.client.install(std::slice::from_ref(&self.package))?;
        if installed.is_empty() {
            Ok(ApplyResult::NoChange)
        } else {
            Ok(ApplyResult::Created)
        }
    }

    fn converged_note(&self) -> Option<String> {
        Some("already installed".to_string())
    }
}

/// A package that must not be installed
#[derive(Debug)]
pub struct PackageRemoval {
    client: Arc<Client>,
    name: String,
}

impl PackageRemoval {
    pub fn new(client: Arc<Client>, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }
}

impl Resource for PackageRemoval {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Remove {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "package_removal"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.client.is_installed(&self.name)? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Absent
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let outcome = self.client.remove(std::slice::from_ref(&self.name))?;
        if outcome.changed() {
            Ok(ApplyResult::Removed)
        } else {
            Ok(ApplyResult::NoChange)
        }
    }

    fn converged_note(&self) -> Option<String> {
        Some("not installed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgkit::DistroProfile;
    use sequencer::{CommandOutput, CommandRunner, ScriptedRunner};

    fn fedora(runner: &Arc<ScriptedRunner>) -> Arc<Client> {
        let profile = DistroProfile::parse("ID=fedora\nVERSION_ID=40\n").unwrap();
        let runner: Arc<dyn CommandRunner> = runner.clone();
        Arc::new(Client::for_distro(&profile, runner).unwrap())
    }

    #[test]
    fn test_install_missing_package() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(&["rpm", "-q", "htop"], CommandOutput::failure(1, "package htop is not installed"));
        let resource = PackageInstall::new(fedora(&runner), Package::name("htop"));

        assert_eq!(resource.current_state().unwrap(), ResourceState::Absent);
        let result = resource.apply(&mut ApplyContext::default()).unwrap();
        assert_eq!(result, ApplyResult::Created);
        assert_eq!(runner.count_matching(&["dnf", "install", "-y", "htop"]), 1);
    }

    #[test]
    fn test_repository_package_queries_provides() {
        let runner = Arc::new(ScriptedRunner::new());
        let resource = PackageInstall::new(
            fedora(&runner),
            Package::url("https://example.org/rpmfusion-free-release-40.noarch.rpm", "rpmfusion-free-release"),
        );
        assert_eq!(resource.resource_type(), "repository");
        assert!(resource.current_state().unwrap().is_present());
        assert_eq!(runner.command_lines(), vec!["rpm -q rpmfusion-free-release"]);
    }

    #[test]
    fn test_remove_absent_package_is_noop() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(&["rpm", "-q", "firefox"], CommandOutput::failure(1, "package firefox is not installed"));
        let resource = PackageRemoval::new(fedora(&runner), "firefox");

        assert_eq!(resource.current_state().unwrap(), resource.desired_state());
        assert_eq!(resource.converged_note().as_deref(), Some("not installed"));
        let result = resource.apply(&mut ApplyContext::default()).unwrap();
        assert_eq!(result, ApplyResult::NoChange);
        assert_eq!(runner.count_matching(&["dnf", "remove"]), 0);
    }

    #[test]
    fn test_remove_installed_package() {
        let runner = Arc::new(ScriptedRunner::new());
        let resource = PackageRemoval::new(fedora(&runner), "totem");
        let result = resource.apply(&mut ApplyContext::default()).unwrap();
        assert_eq!(result, ApplyResult::Removed);
        assert_eq!(runner.count_matching(&["dnf", "remove", "-y", "totem"]), 1);
    }
}
