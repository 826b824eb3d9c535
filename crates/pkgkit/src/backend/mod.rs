//! Package-manager abstraction.
//!
//! The [`PackageManager`] trait describes one distribution family's command
//! set. Implementations only build command lines and interpret output; the
//! [`Client`](crate::Client) runs them through a
//! [`CommandRunner`](sequencer::CommandRunner), which keeps every family
//! testable without the real tool installed.

pub mod apt;
pub mod dnf;
pub mod pacman;
pub mod zypper;

use crate::distro::{DistroId, DistroProfile};
use crate::types::Package;
use sequencer::{CommandOutput, CommandSpec};
use std::fmt;

/// Command set of one package-manager family.
pub trait PackageManager: Send + Sync + fmt::Debug {
    /// Program name, used for error classification and logs.
    fn name(&self) -> &'static str;

    /// Refresh repository metadata, if the family needs a separate call.
    fn refresh(&self) -> Option<CommandSpec>;

    /// Upgrade every installed package.
    fn upgrade(&self) -> CommandSpec;

    /// List pending upgrades.
    fn pending_upgrades(&self) -> CommandSpec;

    /// Count pending upgrades from the listing. None means the listing failed.
    fn count_pending(&self, output: &CommandOutput) -> Option<usize>;

    /// Install packages (repository names and/or URLs).
    fn install(&self, packages: &[Package]) -> Vec<CommandSpec>;

    /// Remove installed packages by name.
    fn remove(&self, names: &[String]) -> CommandSpec;

    /// Query whether a single package is installed.
    fn query(&self, name: &str) -> CommandSpec;

    /// Interpret the output of [`PackageManager::query`].
    fn is_installed(&self, output: &CommandOutput) -> bool {
        output.success
    }

    /// Path of the configuration file tuned by [`PackageManager::optimize_config`].
    fn config_path(&self) -> &'static str;

    /// Apply download tuning to the configuration text.
    ///
    /// Pure and idempotent: feeding the output back in returns it unchanged.
    fn optimize_config(&self, text: &str) -> String;
}

/// Pick the package manager for a distribution.
pub fn for_distro(profile: &DistroProfile) -> Option<Box<dyn PackageManager>> {
    let manager: Box<dyn PackageManager> = match profile.id {
        DistroId::Fedora => Box::new(dnf::Dnf),
        DistroId::Arch | DistroId::Manjaro => Box::new(pacman::Pacman),
        DistroId::Ubuntu | DistroId::Debian => Box::new(apt::Apt),
        DistroId::OpenSuse => Box::new(zypper::Zypper::new(
            profile.raw_id.contains("tumbleweed") || profile.raw_id.contains("slowroll"),
        )),
        DistroId::Unsupported(_) => return None,
    };
    Some(manager)
}

/// Build `program <args...> <packages...>` as a privileged command.
pub(crate) fn privileged(program: &str, args: &[&str], items: &[String]) -> CommandSpec {
    CommandSpec::new(program)
        .args(args.iter().copied())
        .args(items.iter().cloned())
        .privileged()
}

/// Set a key inside an INI-style `[section]`.
///
/// An existing uncommented key wins; otherwise the first commented-out
/// occurrence (`#Color`, `# key = 5`) is replaced; otherwise the line is
/// appended to the section, creating the section when missing.
pub(crate) fn set_conf_line(text: &str, section: &str, key: &str, line: &str) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    let header = format!("[{section}]");
    let mut in_section = false;
    let mut section_end = None;
    let mut active = None;
    let mut commented = None;

    for (idx, raw) in lines.iter().enumerate() {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            if in_section {
                section_end = Some(idx);
            }
            in_section = trimmed == header;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(stripped) = trimmed.strip_prefix('#') {
            if commented.is_none() && matches_key(stripped.trim_start(), key) {
                commented = Some(idx);
            }
        } else if active.is_none() && matches_key(trimmed, key) {
            active = Some(idx);
        }
    }

    if let Some(idx) = active.or(commented) {
        lines[idx] = line.to_string();
    } else if lines.iter().any(|l| l.trim() == header) {
        let mut insert_at = section_end.unwrap_or(lines.len());
        // Keep blank lines that separate sections below the new entry
        while insert_at > 0 && lines[insert_at - 1].trim().is_empty() {
            insert_at -= 1;
        }
        lines.insert(insert_at, line.to_string());
    } else {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(header);
        lines.push(line.to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn matches_key(line: &str, key: &str) -> bool {
    line.strip_prefix(key)
        .map(str::trim_start)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('='))
}
