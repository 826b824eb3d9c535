//! Arch / Manjaro `pacman` backend.

use super::{PackageManager, privileged, set_conf_line};
use crate::types::Package;
use sequencer::{CommandOutput, CommandSpec};

/// pacman (Arch, Manjaro)
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacman;

impl PackageManager for Pacman {
    fn name(&self) -> &'static str {
        "pacman"
    }

    fn refresh(&self) -> Option<CommandSpec> {
        // -Syu syncs the databases
        None
    }

    fn upgrade(&self) -> CommandSpec {
        privileged("pacman", &["-Syu", "--noconfirm"], &[])
    }

    fn pending_upgrades(&self) -> CommandSpec {
        CommandSpec::new("pacman").arg("-Qu")
    }

    fn count_pending(&self, output: &CommandOutput) -> Option<usize> {
        let stdout = output.stdout_str();
        match output.code {
            Some(0) => Some(stdout.lines().filter(|l| !l.trim().is_empty()).count()),
            // -Qu exits 1 when nothing is upgradable
            Some(1) if stdout.trim().is_empty() && output.stderr_str().trim().is_empty() => Some(0),
            _ => None,
        }
    }

    fn install(&self, packages: &[Package]) -> Vec<CommandSpec> {
        let mut names = Vec::new();
        let mut urls = Vec::new();
        for package in packages {
            match package {
                Package::Name(name) => names.push(name.clone()),
                Package::Url { url, .. } => urls.push(url.clone()),
            }
        }

        let mut specs = Vec::new();
        if !urls.is_empty() {
            specs.push(privileged("pacman", &["-U", "--noconfirm"], &urls));
        }
        if !names.is_empty() {
            specs.push(privileged("pacman", &["-S", "--needed", "--noconfirm"], &names));
        }
        specs
    }

    fn remove(&self, names: &[String]) -> CommandSpec {
        privileged("pacman", &["-Rns", "--noconfirm"], names)
    }

    fn query(&self, name: &str) -> CommandSpec {
        CommandSpec::new("pacman").args(["-Q", name])
    }

    fn config_path(&self) -> &'static str {
        "/etc/pacman.conf"
    }

    fn optimize_config(&self, text: &str) -> String {
        let text = set_conf_line(text, "options", "ParallelDownloads", "ParallelDownloads = 10");
        set_conf_line(&text, "options", "Color", "Color")
    }
}
