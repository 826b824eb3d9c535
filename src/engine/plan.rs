//! Provisioning plan builder
//!
//! Turns the probed [`Environment`] and the config into the fixed, ordered
//! list of steps. All questions (Git identity) are asked here, before
//! anything changes on the host.

use anyhow::Result;
use deskkit::DesktopKind;
use pkgkit::{Client, DistroId, Package};
use sequencer::{BoxedResource, CommandRunner, Criticality, Plan, RunAs, Step};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::probe::Environment;
use crate::prompt::{self, Prompter};
use crate::resource::{
    ConfigFile, CryptoPolicy, DesktopSetting, FirewalldZone, FlatpakApp, FlatpakRemote,
    GitConfigValue, GnomeExtension, PackageInstall, PackageRemoval, SystemUpgrade, SystemdService, UfwEnabled,
    UnmappedPreference, git_config,
};
use crate::schema::PostinstallConfig;

// ============================================================================
// Step catalog
// ============================================================================

/// A provisioning step as listed by `postinstall steps`
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub criticality: Criticality,
}

/// Every step postinstall knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepId {
    System,
    Repositories,
    Packages,
    Git,
    Flatpak,
    Debloat,
    Firewall,
    Desktop,
    Extensions,
    Tweaks,
}

impl StepId {
    pub const fn info(self) -> StepInfo {
        match self {
            Self::System => StepInfo {
                name: "system",
                aliases: &["upgrade", "optimize"],
                description: "Tune the package manager and upgrade the system",
                criticality: Criticality::Recoverable,
            },
            Self::Repositories => StepInfo {
                name: "repositories",
                aliases: &["repos", "rpmfusion"],
                description: "Enable extra repositories",
                criticality: Criticality::Recoverable,
            },
            Self::Packages => StepInfo {
                name: "packages",
                aliases: &["essentials"],
                description: "Install essential packages",
                criticality: Criticality::Fatal,
            },
            Self::Git => StepInfo {
                name: "git",
                aliases: &[],
                description: "Configure Git identity and defaults",
                criticality: Criticality::Recoverable,
            },
            Self::Flatpak => StepInfo {
                name: "flatpak",
                aliases: &["flathub", "apps"],
                description: "Add Flathub and install applications",
                criticality: Criticality::Recoverable,
            },
            Self::Debloat => StepInfo {
                name: "debloat",
                aliases: &["remove", "bloat"],
                description: "Remove unwanted preinstalled packages",
                criticality: Criticality::Recoverable,
            },
            Self::Firewall => StepInfo {
                name: "firewall",
                aliases: &["ufw", "firewalld"],
                description: "Enable the firewall",
                criticality: Criticality::Recoverable,
            },
            Self::Desktop => StepInfo {
                name: "desktop",
                aliases: &["preferences", "de", "gnome", "kde"],
                description: "Apply desktop preferences",
                criticality: Criticality::Recoverable,
            },
            Self::Extensions => StepInfo {
                name: "extensions",
                aliases: &["extension", "gnome-extensions"],
                description: "Build and install GNOME Shell extensions",
                criticality: Criticality::Recoverable,
            },
            Self::Tweaks => StepInfo {
                name: "tweaks",
                aliases: &["zram", "crypto"],
                description: "Apply optional system tweaks",
                criticality: Criticality::Recoverable,
            },
        }
    }
}

/// Every step, in execution order
pub const STEPS: [StepInfo; 10] = [
    StepId::System.info(),
    StepId::Repositories.info(),
    StepId::Packages.info(),
    StepId::Git.info(),
    StepId::Flatpak.info(),
    StepId::Debloat.info(),
    StepId::Firewall.info(),
    StepId::Desktop.info(),
    StepId::Extensions.info(),
    StepId::Tweaks.info(),
];

/// Resolve a step name or alias
pub fn normalize_step(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    STEPS
        .iter()
        .find(|s| s.name == name || s.aliases.contains(&name.as_str()))
        .map(|s| s.name)
}

/// Resolve a list of step names, rejecting unknown ones
pub fn normalize_steps(names: &[String]) -> Result<Vec<String>> {
    names
        .iter()
        .map(|n| {
            normalize_step(n)
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("Unknown step '{n}' (see `postinstall steps`)"))
        })
        .collect()
}

fn step(id: StepId) -> Step {
    let info = id.info();
    Step::new(info.name, info.description, info.criticality)
}

fn skip(id: StepId, reason: &str) -> Step {
    let info = id.info();
    Step::skip(info.name, info.description, info.criticality, reason)
}

fn unavailable(id: StepId, reason: &str) -> Step {
    let info = id.info();
    Step::unavailable(info.name, info.description, info.criticality, reason)
}

// ============================================================================
// Context
// ============================================================================

/// Everything the plan builder needs, passed explicitly
pub struct ProvisionContext<'a> {
    pub env: &'a Environment,
    pub config: &'a PostinstallConfig,
    pub runner: Arc<dyn CommandRunner>,
    /// None on an unsupported distribution
    pub packages: Option<Arc<Client>>,
    pub prompter: &'a dyn Prompter,
    /// Filesystem root for config files (`/` outside tests)
    pub root: PathBuf,
}

impl<'a> ProvisionContext<'a> {
    pub fn new(
        env: &'a Environment,
        config: &'a PostinstallConfig,
        runner: Arc<dyn CommandRunner>,
        prompter: &'a dyn Prompter,
    ) -> Self {
        let packages = match Client::for_distro(&env.distro, Arc::clone(&runner)) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        };
        Self {
            env,
            config,
            runner,
            packages,
            prompter,
            root: PathBuf::from("/"),
        }
    }

    /// Use a different filesystem root for config files
    pub fn with_root(mut self, root: &Path) -> Self {
        self.root = root.to_path_buf();
        self
    }

    fn system_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn unsupported_reason(&self) -> String {
        format!("unsupported distribution: {}", self.env.distro.pretty_name)
    }

    fn user(&self) -> RunAs {
        self.env.user.run_as(None)
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Build the full provisioning plan
pub fn build_plan(ctx: &ProvisionContext) -> Result<Plan> {
    let mut plan = Plan::new();
    plan.push(system_step(ctx));
    plan.push(repositories_step(ctx));
    plan.push(packages_step(ctx));
    plan.push(git_step(ctx)?);
    plan.push(flatpak_step(ctx));
    plan.push(debloat_step(ctx));
    plan.push(firewall_step(ctx));
    plan.push(desktop_step(ctx)?);
    plan.push(extensions_step(ctx));
    plan.push(tweaks_step(ctx));
    Ok(plan)
}

fn boxed<R: sequencer::Resource + 'static>(resource: R) -> BoxedResource {
    Box::new(resource)
}

fn system_step(ctx: &ProvisionContext) -> Step {
    let Some(client) = &ctx.packages else {
        return unavailable(StepId::System, &ctx.unsupported_reason());
    };
    let settings = &ctx.config.packages;
    if !settings.optimize && !settings.upgrade {
        return skip(StepId::System, "disabled in config");
    }

    let mut step = step(StepId::System);
    if settings.optimize {
        let manager = client.manager();
        let path = ctx.system_path(manager.config_path());
        let current = std::fs::read_to_string(&path).unwrap_or_default();
        step.push(boxed(ConfigFile::new(
            path,
            manager.optimize_config(&current),
            &format!("Tune {} downloads", manager.name()),
            Arc::clone(&ctx.runner),
        )));
    }
    if settings.upgrade {
        step.push(boxed(SystemUpgrade::new(Arc::clone(client))));
    }
    step
}

fn repositories_step(ctx: &ProvisionContext) -> Step {
    let distro = &ctx.env.distro;
    let repos: Vec<_> = ctx
        .config
        .repositories
        .iter()
        .filter(|r| r.distro == distro.id.as_str())
        .collect();
    if repos.is_empty() {
        return skip(StepId::Repositories, &format!("no repositories configured for {}", distro.id));
    }
    let Some(client) = &ctx.packages else {
        return unavailable(StepId::Repositories, &ctx.unsupported_reason());
    };

    step(StepId::Repositories).with_resources(repos.into_iter().map(|repo| {
        let package = Package::url(repo.resolved_url(distro.version()), &repo.provides);
        boxed(PackageInstall::new(Arc::clone(client), package))
    }))
}

fn packages_step(ctx: &ProvisionContext) -> Step {
    let Some(client) = &ctx.packages else {
        return unavailable(StepId::Packages, &ctx.unsupported_reason());
    };
    step(StepId::Packages).with_resources(
        ctx.config
            .packages
            .essentials
            .iter()
            .map(|name| boxed(PackageInstall::new(Arc::clone(client), Package::name(name)))),
    )
}

/// Git identity: existing global config first, then config file, then ask
fn git_step(ctx: &ProvisionContext) -> Result<Step> {
    let git = &ctx.config.git;
    if !git.enabled {
        return Ok(skip(StepId::Git, "disabled in config"));
    }

    let user = ctx.user();
    let existing = |key: &str| {
        git_config::read_global(ctx.runner.as_ref(), &user, key).unwrap_or_else(|e| {
            // git may not be installed until the packages step has run
            log::debug!("could not read git {key}: {e:#}");
            None
        })
    };

    let name = existing("user.name").or_else(|| git.name.clone());
    let name = prompt::require(ctx.prompter, "Git user name", name.as_deref())?;
    let email = existing("user.email").or_else(|| git.email.clone());
    let email = prompt::require(ctx.prompter, "Git email", email.as_deref())?;

    let mut values = vec![
        ("user.name", name),
        ("user.email", email),
        ("init.defaultBranch", git.default_branch.clone()),
    ];
    if let Some(username) = &git.gerrit_username {
        values.push(("gitreview.username", username.clone()));
    }

    Ok(step(StepId::Git).with_resources(values.into_iter().map(|(key, value)| {
        boxed(GitConfigValue::new(
            key,
            &value,
            user.clone(),
            Arc::clone(&ctx.runner),
        ))
    })))
}

fn flatpak_step(ctx: &ProvisionContext) -> Step {
    let flatpak = &ctx.config.flatpak;
    if !flatpak.enabled {
        return skip(StepId::Flatpak, "disabled in config");
    }
    let mut step = step(StepId::Flatpak).with_resource(boxed(FlatpakRemote::new(
        &flatpak.remote_name,
        &flatpak.remote_url,
        Arc::clone(&ctx.runner),
    )));
    for app in &flatpak.apps {
        step.push(boxed(FlatpakApp::new(
            &flatpak.remote_name,
            app,
            Arc::clone(&ctx.runner),
        )));
    }
    step
}

fn debloat_step(ctx: &ProvisionContext) -> Step {
    let Some(client) = &ctx.packages else {
        return unavailable(StepId::Debloat, &ctx.unsupported_reason());
    };
    let names = ctx
        .config
        .packages
        .remove
        .for_desktop(ctx.env.desktop.kind.as_str());
    if names.is_empty() {
        return skip(StepId::Debloat, "nothing to remove");
    }
    step(StepId::Debloat).with_resources(
        names
            .iter()
            .map(|name| boxed(PackageRemoval::new(Arc::clone(client), name))),
    )
}

fn firewall_step(ctx: &ProvisionContext) -> Step {
    if !ctx.config.firewall.enabled {
        return skip(StepId::Firewall, "disabled in config");
    }
    let Some(client) = &ctx.packages else {
        return unavailable(StepId::Firewall, &ctx.unsupported_reason());
    };
    let runner = || Arc::clone(&ctx.runner);

    match ctx.env.distro.id {
        DistroId::Ubuntu | DistroId::Debian => step(StepId::Firewall)
            .with_resource(boxed(PackageInstall::new(Arc::clone(client), Package::name("ufw"))))
            .with_resource(boxed(UfwEnabled::new(runner()))),
        _ => step(StepId::Firewall)
            .with_resource(boxed(PackageInstall::new(
                Arc::clone(client),
                Package::name("firewalld"),
            )))
            .with_resource(boxed(SystemdService::new("firewalld", runner())))
            .with_resource(boxed(FirewalldZone::new(&ctx.config.firewall.zone, runner()))),
    }
}

fn desktop_step(ctx: &ProvisionContext) -> Result<Step> {
    let desktop = &ctx.config.desktop;
    if !desktop.enabled {
        return Ok(skip(StepId::Desktop, "disabled in config"));
    }
    let profile = &ctx.env.desktop;
    let Some(backend) = profile.backend() else {
        return Ok(skip(
            StepId::Desktop,
            &format!("desktop '{}' is not supported", profile.kind),
        ));
    };
    let Some(bus) = &ctx.env.bus else {
        return Ok(skip(StepId::Desktop, "no active desktop session bus found"));
    };

    let user = ctx.env.user.run_as(Some(bus));
    let mut step = step(StepId::Desktop);
    for preference in desktop.preferences()? {
        match backend.settings(&preference) {
            Ok(settings) => {
                for setting in settings {
                    step.push(boxed(DesktopSetting::new(
                        &preference.to_string(),
                        setting,
                        user.clone(),
                        Arc::clone(&ctx.runner),
                    )));
                }
            }
            Err(unmapped) => {
                log::warn!("{unmapped}");
                step.push(boxed(UnmappedPreference::new(&unmapped)));
            }
        }
    }
    Ok(step)
}

fn extensions_step(ctx: &ProvisionContext) -> Step {
    let extensions = &ctx.config.extensions;
    if !extensions.enabled {
        return skip(StepId::Extensions, "disabled in config");
    }
    if ctx.env.desktop.kind != DesktopKind::Gnome {
        return skip(StepId::Extensions, "extensions are only installed on GNOME");
    }
    if extensions.sources.is_empty() {
        return skip(StepId::Extensions, "no extensions configured");
    }
    let Some(bus) = &ctx.env.bus else {
        return skip(StepId::Extensions, "no active desktop session bus found");
    };

    let user = ctx.env.user.run_as(Some(bus));
    step(StepId::Extensions).with_resources(extensions.sources.iter().map(|source| {
        boxed(GnomeExtension::new(
            source,
            &ctx.env.user.home,
            user.clone(),
            Arc::clone(&ctx.runner),
        ))
    }))
}

fn zram_config(size: &str, algorithm: &str) -> String {
    format!("[zram0]\nzram-size = {size}\ncompression-algorithm = {algorithm}\n")
}

fn tweaks_step(ctx: &ProvisionContext) -> Step {
    let tweaks = &ctx.config.tweaks;
    let mut step = step(StepId::Tweaks);
    if tweaks.zram {
        step.push(boxed(ConfigFile::new(
            ctx.system_path("/etc/systemd/zram-generator.conf"),
            zram_config(&tweaks.zram_size, &tweaks.zram_algorithm),
            "Configure zram swap",
            Arc::clone(&ctx.runner),
        )));
    }
    if let Some(policy) = &tweaks.crypto_policy {
        if ctx.env.distro.id == DistroId::Fedora {
            step.push(boxed(CryptoPolicy::new(policy, Arc::clone(&ctx.runner))));
        } else {
            log::warn!("crypto policy is only managed on Fedora, ignoring '{policy}'");
        }
    }
    if step.is_empty() {
        return skip(StepId::Tweaks, "no tweaks enabled");
    }
    step
}
