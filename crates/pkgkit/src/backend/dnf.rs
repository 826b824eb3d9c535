//! Fedora `dnf` backend.

use super::{PackageManager, privileged, set_conf_line};
use crate::types::Package;
use sequencer::{CommandOutput, CommandSpec};

/// dnf (Fedora)
#[derive(Debug, Clone, Copy, Default)]
pub struct Dnf;

impl PackageManager for Dnf {
    fn name(&self) -> &'static str {
        "dnf"
    }

    fn refresh(&self) -> Option<CommandSpec> {
        // `upgrade --refresh` covers it
        None
    }

    fn upgrade(&self) -> CommandSpec {
        privileged("dnf", &["upgrade", "-y", "--refresh"], &[])
    }

    fn pending_upgrades(&self) -> CommandSpec {
        CommandSpec::new("dnf").args(["check-update", "-q"])
    }

    fn count_pending(&self, output: &CommandOutput) -> Option<usize> {
        // check-update exits 100 when updates are available
        match output.code {
            Some(0) => Some(0),
            Some(100) => Some(
                output
                    .stdout_str()
                    .lines()
                    .take_while(|l| !l.starts_with("Obsoleting"))
                    .filter(|l| l.split_whitespace().count() == 3)
                    .count(),
            ),
            _ => None,
        }
    }

    fn install(&self, packages: &[Package]) -> Vec<CommandSpec> {
        let items: Vec<String> = packages.iter().map(|p| p.install_arg().to_string()).collect();
        vec![privileged("dnf", &["install", "-y"], &items)]
    }

    fn remove(&self, names: &[String]) -> CommandSpec {
        privileged("dnf", &["remove", "-y"], names)
    }

    fn query(&self, name: &str) -> CommandSpec {
        CommandSpec::new("rpm").args(["-q", name])
    }

    fn config_path(&self) -> &'static str {
        "/etc/dnf/dnf.conf"
    }

    fn optimize_config(&self, text: &str) -> String {
        let text = set_conf_line(
            text,
            "main",
            "max_parallel_downloads",
            "max_parallel_downloads=10",
        );
        set_conf_line(&text, "main", "fastestmirror", "fastestmirror=True")
    }
}
