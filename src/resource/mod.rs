//! Provisioning resources
//!
//! Every change postinstall makes is a [`sequencer::Resource`] with:
//! - State detection (current vs desired), read through a [`CommandRunner`]
//! - An apply function that converges current to desired
//!
//! Resources hold what they need (runner, package client, run-as target) so
//! the plan can be built once and executed without global state.

use anyhow::Result;
use sequencer::{CommandOutput, CommandRunner, CommandSpec};

pub mod crypto_policy;
pub mod extension;
pub mod file;
pub mod firewall;
pub mod flatpak;
pub mod git_config;
pub mod package;
pub mod service;
pub mod setting;
pub mod upgrade;

pub use crypto_policy::CryptoPolicy;
pub use extension::GnomeExtension;
pub use file::ConfigFile;
pub use firewall::{FirewalldZone, UfwEnabled};
pub use flatpak::{FlatpakApp, FlatpakRemote};
pub use git_config::GitConfigValue;
pub use package::{PackageInstall, PackageRemoval};
pub use service::SystemdService;
pub use setting::{DesktopSetting, UnmappedPreference};
pub use upgrade::SystemUpgrade;

/// Run a command and fail on a non-zero exit
pub(crate) fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<CommandOutput> {
    runner.run(spec)?.check(spec)
}
