//! Environment prober: distro, desktop, desktop user and session bus

use anyhow::{Context, Result};
use deskkit::{BusDiscovery, DesktopProfile, PasswdFile, SessionBus, SystemUsers, TargetUser};
use pkgkit::DistroProfile;
use sequencer::CommandRunner;
use std::path::PathBuf;

/// Host files consulted while probing
#[derive(Debug, Clone)]
pub struct ProbePaths {
    pub os_release: PathBuf,
    /// A passwd file to read users from instead of the system database
    pub passwd: Option<PathBuf>,
    pub proc_root: PathBuf,
    pub runtime_root: PathBuf,
}

impl Default for ProbePaths {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from(pkgkit::distro::OS_RELEASE),
            passwd: None,
            proc_root: PathBuf::from("/proc"),
            runtime_root: PathBuf::from("/run/user"),
        }
    }
}

/// Everything learned about the host before planning
#[derive(Debug)]
pub struct Environment {
    pub distro: DistroProfile,
    pub desktop: DesktopProfile,
    /// The user desktop settings and Git config belong to
    pub user: TargetUser,
    pub bus: Option<SessionBus>,
    pub euid: u32,
}

impl Environment {
    pub fn is_root(&self) -> bool {
        self.euid == 0
    }
}

/// Effective uid of this process
#[allow(unsafe_code)]
pub fn current_euid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe {
        libc::geteuid()
    }
}

/// Process environment lookup
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Probe the host
///
/// An unreadable os-release or an unknown desktop user is fatal. An unknown
/// distribution or desktop is not; steps that need them are skipped later.
pub fn probe(
    paths: &ProbePaths,
    env: &dyn Fn(&str) -> Option<String>,
    euid: u32,
    allow_dbus_launch: bool,
    runner: &dyn CommandRunner,
) -> Result<Environment> {
    let distro = DistroProfile::detect(&paths.os_release)
        .context("Could not resolve the Linux distribution")?;
    log::info!("distro: {} ({})", distro.pretty_name, distro.id);

    let user = match &paths.passwd {
        Some(file) => {
            PasswdFile::load(file).and_then(|users| TargetUser::resolve(env, euid, &users))
        }
        None => TargetUser::resolve(env, euid, &SystemUsers),
    }
    .context("Could not determine the desktop user")?;
    log::info!("desktop user: {} (uid {})", user.name, user.uid);

    let kind = deskkit::detect::detect(env, &paths.proc_root, Some(user.uid));
    log::info!("desktop: {kind}");

    let bus = if kind.is_supported() {
        BusDiscovery {
            env,
            euid,
            runtime_root: paths.runtime_root.clone(),
            proc_root: paths.proc_root.clone(),
            allow_dbus_launch,
            runner,
        }
        .discover(&user)
    } else {
        None
    };
    match &bus {
        Some(bus) => log::info!("session bus: {} ({:?})", bus.address, bus.source),
        None => log::info!("no session bus found"),
    }

    Ok(Environment {
        distro,
        desktop: DesktopProfile::new(kind),
        user,
        bus,
        euid,
    })
}
