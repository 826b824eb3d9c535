//! Debian / Ubuntu `apt` backend.

use super::{PackageManager, privileged};
use crate::types::Package;
use sequencer::{CommandOutput, CommandSpec};

const RETRIES: &str = "Acquire::Retries \"3\";";

/// apt (Debian, Ubuntu and derivatives)
#[derive(Debug, Clone, Copy, Default)]
pub struct Apt;

fn noninteractive(spec: CommandSpec) -> CommandSpec {
    spec.env("DEBIAN_FRONTEND", "noninteractive")
}

impl PackageManager for Apt {
    fn name(&self) -> &'static str {
        "apt-get"
    }

    fn refresh(&self) -> Option<CommandSpec> {
        Some(privileged("apt-get", &["update"], &[]))
    }

    fn upgrade(&self) -> CommandSpec {
        noninteractive(privileged("apt-get", &["full-upgrade", "-y"], &[]))
    }

    fn pending_upgrades(&self) -> CommandSpec {
        CommandSpec::new("apt").args(["list", "--upgradable"])
    }

    fn count_pending(&self, output: &CommandOutput) -> Option<usize> {
        output.success.then(|| {
            output
                .stdout_str()
                .lines()
                .filter(|l| l.contains("[upgradable from"))
                .count()
        })
    }

    fn install(&self, packages: &[Package]) -> Vec<CommandSpec> {
        let items: Vec<String> = packages.iter().map(|p| p.install_arg().to_string()).collect();
        vec![noninteractive(privileged("apt-get", &["install", "-y"], &items))]
    }

    fn remove(&self, names: &[String]) -> CommandSpec {
        noninteractive(privileged("apt-get", &["remove", "-y"], names))
    }

    fn query(&self, name: &str) -> CommandSpec {
        CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}", name])
    }

    fn is_installed(&self, output: &CommandOutput) -> bool {
        // Removed-but-not-purged packages still have a status entry
        output.success && output.stdout_str().contains("install ok installed")
    }

    fn config_path(&self) -> &'static str {
        "/etc/apt/apt.conf.d/99postinstall"
    }

    fn optimize_config(&self, text: &str) -> String {
        let mut lines: Vec<&str> = text
            .lines()
            .filter(|l| !l.trim_start().starts_with("Acquire::Retries"))
            .collect();
        lines.push(RETRIES);
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_config() {
        assert_eq!(Apt.optimize_config(""), "Acquire::Retries \"3\";\n");
        let existing = "Acquire::Retries \"0\";\nAPT::Install-Recommends \"false\";\n";
        let out = Apt.optimize_config(existing);
        assert_eq!(
            out,
            "APT::Install-Recommends \"false\";\nAcquire::Retries \"3\";\n"
        );
        assert_eq!(Apt.optimize_config(&out), out);
    }

    #[test]
    fn test_is_installed_checks_status() {
        assert!(Apt.is_installed(&CommandOutput::ok("install ok installed")));
        assert!(!Apt.is_installed(&CommandOutput::ok("deinstall ok config-files")));
        assert!(!Apt.is_installed(&CommandOutput::failure(
            1,
            "dpkg-query: no packages found matching firefox"
        )));
    }

    #[test]
    fn test_count_pending() {
        let out = CommandOutput::ok(
            "Listing... Done\nbash/jammy-updates 5.1-6ubuntu1.1 amd64 [upgradable from: 5.1-6ubuntu1]\n",
        );
        assert_eq!(Apt.count_pending(&out), Some(1));
    }

    #[test]
    fn test_upgrade_is_noninteractive() {
        let spec = Apt.upgrade();
        assert_eq!(spec.argv(), vec!["apt-get", "full-upgrade", "-y"]);
        assert!(spec.env.contains(&("DEBIAN_FRONTEND".into(), "noninteractive".into())));
    }
}
