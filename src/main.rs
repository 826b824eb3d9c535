mod cli;
mod commands;
mod engine;
mod paths;
mod probe;
mod progress;
mod prompt;
mod resource;
mod runlog;
mod schema;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConfigCommand};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command.unwrap_or_else(|| Command::Provision(Default::default())) {
        Command::Provision(args) => commands::provision::run(&ctx, &args),
        Command::Kernel(args) => commands::kernel::run(&ctx, &args),
        Command::Steps => {
            commands::steps::run(&ctx);
            Ok(())
        }
        Command::Doctor => commands::doctor::run(&ctx),
        Command::Config(cmd) => match cmd {
            ConfigCommand::Show => commands::config::show(&ctx),
            ConfigCommand::Init { force } => commands::config::init(&ctx, force),
        },
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "postinstall", &mut io::stdout());
            Ok(())
        }
    }
}
