//! `postinstall provision` - probe, plan, confirm, run, summarize

use anyhow::{Result, bail};
use colored::Colorize;
use sequencer::{CommandRunner, ExecuteOptions, Plan, RunReport, StepBody, SystemRunner};
use std::sync::Arc;

use crate::Context;
use crate::cli::ProvisionArgs;
use crate::engine::{self, ConsoleObserver, ProvisionContext, normalize_steps};
use crate::probe::{self, Environment, ProbePaths};
use crate::prompt::{self, Prompter};
use crate::runlog::RunLog;
use crate::schema::PostinstallConfig;
use crate::sudo::SudoContext;
use crate::ui;

pub fn run(ctx: &Context, args: &ProvisionArgs) -> Result<()> {
    if !ctx.quiet {
        ui::banner();
    }

    let (config, config_path) = PostinstallConfig::load()?;
    log::info!("config: {}", config_path.display());

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let env = probe::probe(
        &ProbePaths::default(),
        &probe::process_env,
        probe::current_euid(),
        config.desktop.allow_dbus_launch,
        runner.as_ref(),
    )?;
    print_environment(&env);

    let prompter = prompt::for_terminal();
    let pctx = ProvisionContext::new(&env, &config, runner, prompter.as_ref());
    let plan = prepare(&pctx, args)?;
    print_plan(&plan);
    confirm(prompter.as_ref(), args)?;

    let _sudo = SudoContext::acquire_unless_root(
        env.is_root(),
        "install packages and change system settings",
    )?;

    let mut log = open_log(&config, args);
    let report = execute_plan(plan, args.dry_run, ctx.verbose > 0, log.as_mut());

    engine::print_summary(&report, args.dry_run);
    if let Some(log) = log.as_mut() {
        for line in engine::summary_lines(&report) {
            log.line(&line);
        }
        ui::dim(&format!("Run log: {}", log.path().display()));
    }

    if let Some(step) = &report.aborted {
        bail!("Provisioning stopped: fatal step '{step}' failed");
    }
    Ok(())
}

/// Build the plan and apply `--only` / `--skip`
pub fn prepare(pctx: &ProvisionContext, args: &ProvisionArgs) -> Result<Plan> {
    let only = args.only.as_deref().map(normalize_steps).transpose()?;
    let skip = args.skip.as_deref().map(normalize_steps).transpose()?;

    let plan = engine::build_plan(pctx)?.select(only.as_deref(), skip.as_deref());
    if plan.is_empty() {
        bail!("No steps selected");
    }
    Ok(plan)
}

/// Ask before changing anything; declining stops the run
pub fn confirm(prompter: &dyn Prompter, args: &ProvisionArgs) -> Result<()> {
    if args.yes || args.dry_run {
        return Ok(());
    }
    if !prompter.confirm("Proceed with provisioning?", true)? {
        bail!("Provisioning cancelled");
    }
    Ok(())
}

/// Run the plan, logging to the run log when one is open
pub fn execute_plan(
    plan: Plan,
    dry_run: bool,
    verbose: bool,
    log: Option<&mut RunLog>,
) -> RunReport {
    let opts = ExecuteOptions { dry_run, verbose };
    let console = ConsoleObserver::new(verbose);
    match log {
        Some(log) => {
            log.line(&format!(
                "run started{}",
                if dry_run { " (dry run)" } else { "" }
            ));
            sequencer::execute(plan, &opts, &mut (console, log))
        }
        None => {
            let mut console = console;
            sequencer::execute(plan, &opts, &mut console)
        }
    }
}

/// A missing or unwritable log directory only costs the log
fn open_log(config: &PostinstallConfig, args: &ProvisionArgs) -> Option<RunLog> {
    if args.no_log || (!config.log.enabled && args.log_file.is_none()) {
        return None;
    }
    let opened = match &args.log_file {
        Some(path) => RunLog::create_at(path.clone()),
        None => config
            .log
            .resolved_dir()
            .and_then(|dir| RunLog::create(&dir)),
    };
    match opened {
        Ok(log) => Some(log),
        Err(e) => {
            ui::warn(&format!("Run log disabled: {e:#}"));
            None
        }
    }
}

fn print_environment(env: &Environment) {
    ui::section("Environment");
    ui::kv("Distribution", &env.distro.pretty_name);
    ui::kv("Desktop", env.desktop.kind.as_str());
    ui::kv("User", &env.user.name);
    ui::kv(
        "Session bus",
        env.bus.as_ref().map_or("not found", |b| b.address.as_str()),
    );
}

fn print_plan(plan: &Plan) {
    ui::section("Plan");
    for step in &plan.steps {
        let detail = match &step.body {
            StepBody::Resources(r) => format!("{} items", r.len()),
            StepBody::Skip { reason } | StepBody::Unavailable { reason } => {
                format!("skip: {reason}")
            }
        };
        println!(
            "  {} {} {}",
            "•".cyan(),
            step.name,
            format!("({detail})").dimmed()
        );
    }
}
