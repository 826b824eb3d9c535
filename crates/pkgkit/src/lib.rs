//! # pkgkit
//!
//! Distribution detection and a uniform client over the system package
//! manager (dnf, apt, pacman, zypper).
//!
//! ## Example
//!
//! ```no_run
//! use pkgkit::{Client, DistroProfile, Package};
//! use sequencer::SystemRunner;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let profile = DistroProfile::detect(Path::new(pkgkit::distro::OS_RELEASE))?;
//! let client = Client::for_distro(&profile, Arc::new(SystemRunner::new()))?;
//!
//! client.install(&[Package::name("git")])?;
//!
//! // Removing something that is not installed is not an error
//! client.remove(&["firefox".to_string()])?;
//! # Ok::<(), pkgkit::Error>(())
//! ```
//!
//! ## Idempotence
//!
//! `install` only passes missing packages to the manager and `remove` only
//! passes installed ones. If the manager still reports an absent removal
//! target, the result is [`RemoveOutcome::AlreadyAbsent`].

pub mod backend;
pub mod distro;
pub mod error;
pub mod types;

pub use backend::PackageManager;
pub use distro::{DistroId, DistroProfile};
pub use error::{Error, ErrorCategory, Result};
pub use types::{Package, RemoveOutcome};

use sequencer::{CommandOutput, CommandRunner, CommandSpec};
use std::sync::Arc;

/// High-level client over one package manager.
pub struct Client {
    manager: Box<dyn PackageManager>,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with an explicit manager (useful for testing).
    pub fn new(manager: Box<dyn PackageManager>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { manager, runner }
    }

    /// Create a client for the detected distribution.
    ///
    /// Returns [`Error::Unsupported`] for distributions without a backend.
    pub fn for_distro(profile: &DistroProfile, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let manager = backend::for_distro(profile)
            .ok_or_else(|| Error::Unsupported(profile.pretty_name.clone()))?;
        Ok(Self::new(manager, runner))
    }

    /// The underlying command set.
    pub fn manager(&self) -> &dyn PackageManager {
        self.manager.as_ref()
    }

    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.runner.run(spec).map_err(|e| Error::Spawn {
            program: spec.program.clone(),
            message: format!("{e:#}"),
        })
    }

    fn run_checked(&self, spec: &CommandSpec, package: Option<&str>) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        if output.success {
            return Ok(output);
        }
        Err(Error::from_output(
            self.manager.name(),
            output.code,
            &combined(&output),
            package,
        ))
    }

    /// Check if a package is installed.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        let output = self.run(&self.manager.query(name))?;
        Ok(self.manager.is_installed(&output))
    }

    /// Packages from `packages` that are not installed yet.
    pub fn missing(&self, packages: &[Package]) -> Result<Vec<Package>> {
        let mut missing = Vec::new();
        for package in packages {
            if !self.is_installed(package.query_name())? {
                missing.push(package.clone());
            }
        }
        Ok(missing)
    }

    /// Refresh repository metadata.
    pub fn refresh(&self) -> Result<()> {
        if let Some(spec) = self.manager.refresh() {
            self.run_checked(&spec, None)?;
        }
        Ok(())
    }

    /// Upgrade all packages.
    pub fn upgrade(&self) -> Result<()> {
        self.refresh()?;
        self.run_checked(&self.manager.upgrade(), None)?;
        Ok(())
    }

    /// Number of packages with a pending upgrade.
    ///
    /// The listing is read from local metadata; call [`Client::refresh`]
    /// first for an up-to-date answer.
    pub fn pending_upgrades(&self) -> Result<usize> {
        let spec = self.manager.pending_upgrades();
        let output = self.run(&spec)?;
        self.manager.count_pending(&output).ok_or_else(|| {
            Error::from_output(self.manager.name(), output.code, &combined(&output), None)
        })
    }

    /// Install packages that are not installed yet.
    ///
    /// Returns the packages that were actually installed.
    pub fn install(&self, packages: &[Package]) -> Result<Vec<Package>> {
        let missing = self.missing(packages)?;
        if missing.is_empty() {
            return Ok(missing);
        }

        let label = missing
            .iter()
            .map(|p| p.query_name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        log::info!("installing {label} with {}", self.manager.name());

        for spec in self.manager.install(&missing) {
            self.run_checked(&spec, Some(&label))?;
        }
        Ok(missing)
    }

    /// Remove packages; absent packages are not an error.
    pub fn remove(&self, names: &[String]) -> Result<RemoveOutcome> {
        let mut installed = Vec::new();
        for name in names {
            if self.is_installed(name)? {
                installed.push(name.clone());
            } else {
                log::debug!("{name} is not installed, nothing to remove");
            }
        }
        if installed.is_empty() {
            return Ok(RemoveOutcome::AlreadyAbsent);
        }

        let label = installed.join(", ");
        log::info!("removing {label} with {}", self.manager.name());

        let output = self.run(&self.manager.remove(&installed))?;
        if output.success {
            return Ok(RemoveOutcome::Removed(installed));
        }

        let err = Error::from_remove_output(
            self.manager.name(),
            output.code,
            &combined(&output),
            Some(&label),
        );
        if err.is_ignorable() {
            log::debug!("{label}: {err}");
            Ok(RemoveOutcome::AlreadyAbsent)
        } else {
            Err(err)
        }
    }
}

/// Package managers split diagnostics between stdout and stderr.
fn combined(output: &CommandOutput) -> String {
    let mut text = output.stderr_str();
    let stdout = output.stdout_str();
    if !stdout.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stdout);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer::ScriptedRunner;

    const DISTROS: [&str; 6] = [
        "ID=fedora\nVERSION_ID=40\n",
        "ID=arch\n",
        "ID=manjaro\nID_LIKE=arch\n",
        "ID=ubuntu\nID_LIKE=debian\n",
        "ID=debian\n",
        "ID=\"opensuse-tumbleweed\"\nID_LIKE=\"opensuse suse\"\n",
    ];

    fn client(os_release: &str, runner: &Arc<ScriptedRunner>) -> Client {
        let profile = DistroProfile::parse(os_release).unwrap();
        let runner: Arc<dyn CommandRunner> = runner.clone();
        Client::for_distro(&profile, runner).unwrap()
    }

    /// Register "not installed" for the distro's query command
    fn not_installed(client: &Client, runner: &ScriptedRunner, name: &str) {
        let argv = client.manager().query(name).argv();
        let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
        runner.on(&argv, CommandOutput::failure(1, "package is not installed"));
    }

    #[test]
    fn test_remove_absent_package_every_distro() {
        for os_release in DISTROS {
            let runner = Arc::new(ScriptedRunner::new());
            let client = client(os_release, &runner);
            not_installed(&client, &runner, "firefox");

            let outcome = client.remove(&["firefox".to_string()]).unwrap();
            assert_eq!(outcome, RemoveOutcome::AlreadyAbsent, "{os_release}");

            let remove = client.manager().remove(&["firefox".to_string()]);
            assert_eq!(runner.count_matching(&[remove.program.as_str(), remove.args[0].as_str()]), 0);
        }
    }

    #[test]
    fn test_remove_installed_package_every_distro() {
        for os_release in DISTROS {
            let runner = Arc::new(ScriptedRunner::new());
            runner.on(&["dpkg-query"], CommandOutput::ok("install ok installed"));
            let client = client(os_release, &runner);

            let outcome = client.remove(&["firefox".to_string()]).unwrap();
            assert_eq!(
                outcome,
                RemoveOutcome::Removed(vec!["firefox".to_string()]),
                "{os_release}"
            );
        }
    }

    #[test]
    fn test_remove_race_maps_to_already_absent() {
        // Query says installed, but the manager no longer finds it
        let cases = [
            ("ID=opensuse-leap\n", "zypper", CommandOutput::failure(104, "")),
            (
                "ID=arch\n",
                "pacman",
                CommandOutput::failure(1, "error: target not found: firefox"),
            ),
            (
                "ID=fedora\n",
                "dnf",
                CommandOutput::failure(1, "No match for argument: firefox"),
            ),
            (
                "ID=debian\n",
                "apt-get",
                CommandOutput::failure(100, "E: Unable to locate package firefox"),
            ),
        ];

        for (os_release, program, failure) in cases {
            let runner = Arc::new(ScriptedRunner::new());
            runner.on(&["dpkg-query"], CommandOutput::ok("install ok installed"));
            let client = client(os_release, &runner);
            let remove = client.manager().remove(&["firefox".to_string()]);
            runner.on(&[program, remove.args[0].as_str()], failure);

            let outcome = client.remove(&["firefox".to_string()]).unwrap();
            assert_eq!(outcome, RemoveOutcome::AlreadyAbsent, "{program}");
        }
    }

    #[test]
    fn test_remove_real_failure_propagates() {
        let runner = Arc::new(ScriptedRunner::new());
        let client = client("ID=fedora\n", &runner);
        runner.on(
            &["dnf", "remove"],
            CommandOutput::failure(1, "Error: Could not resolve host: mirrors.fedoraproject.org"),
        );

        let err = client.remove(&["firefox".to_string()]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_install_only_missing() {
        let runner = Arc::new(ScriptedRunner::new());
        let client = client("ID=fedora\n", &runner);
        runner.on(&["rpm", "-q", "vim"], CommandOutput::failure(1, "package vim is not installed"));

        let installed = client
            .install(&[Package::name("git"), Package::name("vim")])
            .unwrap();
        assert_eq!(installed, vec![Package::name("vim")]);
        assert!(
            runner
                .command_lines()
                .contains(&"dnf install -y vim".to_string())
        );
    }

    #[test]
    fn test_install_nothing_missing_runs_no_install() {
        let runner = Arc::new(ScriptedRunner::new());
        let client = client("ID=arch\n", &runner);
        assert!(client.install(&[Package::name("git")]).unwrap().is_empty());
        assert_eq!(runner.count_matching(&["pacman", "-S"]), 0);
    }

    #[test]
    fn test_upgrade_refreshes_first() {
        let runner = Arc::new(ScriptedRunner::new());
        let client = client("ID=ubuntu\n", &runner);
        client.upgrade().unwrap();
        assert_eq!(
            runner.command_lines(),
            vec!["apt-get update", "apt-get full-upgrade -y"]
        );
    }

    #[test]
    fn test_unsupported_distro() {
        let profile = DistroProfile::parse("ID=gentoo\nPRETTY_NAME=\"Gentoo Linux\"\n").unwrap();
        let runner: Arc<dyn CommandRunner> = Arc::new(ScriptedRunner::new());
        let err = Client::for_distro(&profile, runner).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unsupported);
        assert_eq!(err.to_string(), "unsupported distribution: Gentoo Linux");
    }
}
