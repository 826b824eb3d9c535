//! openSUSE `zypper` backend.

use super::{PackageManager, privileged, set_conf_line};
use crate::types::Package;
use sequencer::{CommandOutput, CommandSpec};

/// zypper (openSUSE Leap and Tumbleweed)
#[derive(Debug, Clone, Copy, Default)]
pub struct Zypper {
    /// Rolling releases upgrade with `dup`
    rolling: bool,
}

impl Zypper {
    pub fn new(rolling: bool) -> Self {
        Self { rolling }
    }
}

impl PackageManager for Zypper {
    fn name(&self) -> &'static str {
        "zypper"
    }

    fn refresh(&self) -> Option<CommandSpec> {
        Some(privileged("zypper", &["--non-interactive", "refresh"], &[]))
    }

    fn upgrade(&self) -> CommandSpec {
        let verb = if self.rolling { "dup" } else { "update" };
        privileged("zypper", &["--non-interactive", verb], &[])
    }

    fn pending_upgrades(&self) -> CommandSpec {
        CommandSpec::new("zypper").args(["--non-interactive", "list-updates"])
    }

    fn count_pending(&self, output: &CommandOutput) -> Option<usize> {
        output.success.then(|| {
            output
                .stdout_str()
                .lines()
                .filter(|l| l.trim_start().starts_with("v "))
                .count()
        })
    }

    fn install(&self, packages: &[Package]) -> Vec<CommandSpec> {
        let items: Vec<String> = packages.iter().map(|p| p.install_arg().to_string()).collect();
        vec![privileged(
            "zypper",
            &["--non-interactive", "install", "--allow-unsigned-rpm"],
            &items,
        )]
    }

    fn remove(&self, names: &[String]) -> CommandSpec {
        privileged("zypper", &["--non-interactive", "remove", "--clean-deps"], names)
    }

    fn query(&self, name: &str) -> CommandSpec {
        CommandSpec::new("rpm").args(["-q", name])
    }

    fn config_path(&self) -> &'static str {
        "/etc/zypp/zypp.conf"
    }

    fn optimize_config(&self, text: &str) -> String {
        set_conf_line(
            text,
            "main",
            "download.max_concurrent_connections",
            "download.max_concurrent_connections = 10",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_verb() {
        assert_eq!(Zypper::new(true).upgrade().args[1], "dup");
        assert_eq!(Zypper::new(false).upgrade().args[1], "update");
    }

    #[test]
    fn test_optimize_config() {
        let stock = "[main]\n## Valid values: [1, 10]\n# download.max_concurrent_connections = 5\n";
        let out = Zypper::default().optimize_config(stock);
        assert_eq!(
            out,
            "[main]\n## Valid values: [1, 10]\ndownload.max_concurrent_connections = 10\n"
        );
        assert_eq!(Zypper::default().optimize_config(&out), out);
    }

    #[test]
    fn test_count_pending() {
        let listing = "S | Repository | Name | Current | Available | Arch\n--+---\nv | repo-oss | curl | 8.6 | 8.7 | x86_64\nv | repo-oss | vim | 9.0 | 9.1 | x86_64\n";
        assert_eq!(
            Zypper::default().count_pending(&CommandOutput::ok(listing)),
            Some(2)
        );
    }
}
