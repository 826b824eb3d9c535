use anyhow::Result;
use colored::Colorize;
use deskkit::DesktopKind;
use pkgkit::{DistroId, DistroProfile};
use sequencer::{CommandRunner, SystemRunner};

use crate::Context;
use crate::paths;
use crate::probe::{self, Environment, ProbePaths};
use crate::schema::PostinstallConfig;
use crate::sudo::SudoContext;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    fix: Option<String>,
}

pub fn run(_ctx: &Context) -> Result<()> {
    ui::banner();
    ui::header("System Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    let config = check_config(&mut issues);
    let runner = SystemRunner::new();
    let env = check_environment(&config, &runner, &mut issues);
    if let Some(env) = &env {
        check_commands(env, &mut issues);
        check_privileges(env, &mut issues);
    }

    println!();
    if issues.is_empty() {
        ui::success("Ready to provision!");
    } else {
        print_issue_summary(&issues);
    }
    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
    }
}

fn check_config(issues: &mut Vec<Issue>) -> PostinstallConfig {
    ui::section("Configuration");

    let path = match paths::config_file() {
        Ok(path) => path,
        Err(e) => {
            ui::error("Could not determine config directory");
            issues.push(Issue {
                category: "Configuration",
                summary: format!("{e:#}"),
                fix: Some("Set HOME or POSTINSTALL_CONFIG_DIR".into()),
            });
            return PostinstallConfig::with_defaults();
        }
    };

    if !path.exists() {
        ui::kv("config.toml", "not found, using defaults");
        return PostinstallConfig::with_defaults();
    }
    match PostinstallConfig::load_from(&path) {
        Ok(config) => {
            println!("  {} {}", "✓".green(), path.display());
            config
        }
        Err(e) => {
            println!("  {} {} {}", "✗".red(), path.display(), format!("({e:#})").red());
            issues.push(Issue {
                category: "Configuration",
                summary: format!("{} is invalid", path.display()),
                fix: Some("Edit the file or run `postinstall config init --force`".into()),
            });
            PostinstallConfig::with_defaults()
        }
    }
}

fn check_environment(
    config: &PostinstallConfig,
    runner: &dyn CommandRunner,
    issues: &mut Vec<Issue>,
) -> Option<Environment> {
    ui::section("Environment");

    let env = match probe::probe(
        &ProbePaths::default(),
        &probe::process_env,
        probe::current_euid(),
        config.desktop.allow_dbus_launch,
        runner,
    ) {
        Ok(env) => env,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            issues.push(Issue {
                category: "Environment",
                summary: format!("{e:#}"),
                fix: None,
            });
            return None;
        }
    };

    ui::kv("Distribution", &format!("{} ({})", env.distro.pretty_name, env.distro.id));
    ui::kv("Desktop", env.desktop.kind.as_str());
    ui::kv("User", &format!("{} (uid {})", env.user.name, env.user.uid));
    match &env.bus {
        Some(bus) => ui::kv("Session bus", &format!("{} ({:?})", bus.address, bus.source)),
        None => ui::kv("Session bus", "not found"),
    }

    if !env.distro.id.is_supported() {
        issues.push(Issue {
            category: "Environment",
            summary: format!(
                "{} is not supported; package steps will be skipped",
                env.distro.pretty_name
            ),
            fix: None,
        });
    }
    if !env.desktop.kind.is_supported() {
        issues.push(Issue {
            category: "Environment",
            summary: format!(
                "desktop '{}' is not supported; preferences will be skipped",
                env.desktop.kind
            ),
            fix: None,
        });
    } else if env.bus.is_none() {
        issues.push(Issue {
            category: "Environment",
            summary: "no desktop session bus found; preferences will be skipped".into(),
            fix: Some("Run from inside the desktop session, or set allow_dbus_launch".into()),
        });
    }
    Some(env)
}

/// Installed by the packages step when missing
const INSTALLED_DURING_RUN: [&str; 2] = ["git", "flatpak"];

/// External commands that must exist before the run
fn required_commands(distro: &DistroProfile, desktop: &DesktopKind) -> Vec<&'static str> {
    let mut commands = vec!["systemctl"];
    commands.extend(match distro.id {
        DistroId::Fedora => &["dnf", "rpm"][..],
        DistroId::Arch | DistroId::Manjaro => &["pacman"][..],
        DistroId::Ubuntu | DistroId::Debian => &["apt-get", "dpkg-query"][..],
        DistroId::OpenSuse => &["zypper", "rpm"][..],
        DistroId::Unsupported(_) => &[][..],
    });
    commands.extend(match desktop {
        DesktopKind::Gnome => &["gsettings", "gnome-extensions"][..],
        DesktopKind::Kde => &["plasma-apply-colorscheme"][..],
        DesktopKind::Other(_) => &[][..],
    });
    commands
}

fn check_commands(env: &Environment, issues: &mut Vec<Issue>) {
    ui::section("Required Commands");

    for cmd in required_commands(&env.distro, &env.desktop.kind) {
        if which::which(cmd).is_ok() {
            println!("  {} {}", "✓".green(), cmd);
        } else {
            println!("  {} {} {}", "✗".red(), cmd, "(missing)".red());
            issues.push(Issue {
                category: "Required Commands",
                summary: format!("{cmd} is not installed"),
                fix: None,
            });
        }
    }
    for cmd in INSTALLED_DURING_RUN {
        if which::which(cmd).is_ok() {
            println!("  {} {}", "✓".green(), cmd);
        } else {
            println!("  {} {} {}", "○".dimmed(), cmd, "(installed by the packages step)".dimmed());
        }
    }
}

fn check_privileges(env: &Environment, issues: &mut Vec<Issue>) {
    ui::section("Privileges");

    if env.is_root() {
        println!("  {} running as root", "✓".green());
    } else if which::which("sudo").is_err() {
        println!("  {} sudo {}", "✗".red(), "(missing)".red());
        issues.push(Issue {
            category: "Privileges",
            summary: "not root and sudo is not installed".into(),
            fix: Some("Run postinstall as root".into()),
        });
    } else if SudoContext::is_valid() {
        println!("  {} sudo credentials cached", "✓".green());
    } else {
        ui::dim("sudo will ask for your password before provisioning");
    }
}
