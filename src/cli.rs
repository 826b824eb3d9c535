use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "postinstall")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision a fresh Linux desktop in one run", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Defaults to `provision`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the provisioning steps (default)
    Provision(ProvisionArgs),

    /// Build a kernel and package it as a flashable zip
    Kernel(KernelArgs),

    /// List provisioning steps and their aliases
    Steps,

    /// Show the detected environment and missing tools
    Doctor,

    /// Show or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct ProvisionArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Read current state and show what would change
    #[arg(long)]
    pub dry_run: bool,

    /// Run only these steps (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Option<Vec<String>>,

    /// Skip these steps (comma-separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "only")]
    pub skip: Option<Vec<String>>,

    /// Write the run log to this file
    #[arg(long, conflicts_with = "no_log")]
    pub log_file: Option<PathBuf>,

    /// Do not write a run log
    #[arg(long)]
    pub no_log: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct KernelArgs {
    /// Kernel source repository URL
    #[arg(long)]
    pub repo: Option<String>,

    /// Branch to clone
    #[arg(long)]
    pub branch: Option<String>,

    /// Directory name for the kernel source
    #[arg(long)]
    pub dir: Option<String>,

    /// Defconfig name (`_defconfig` is appended when missing)
    #[arg(long)]
    pub defconfig: Option<String>,

    /// Toolchain archive URL (.tar.gz or .tar.zst)
    #[arg(long)]
    pub toolchain_url: Option<String>,

    /// Parallel make jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Work directory (defaults to the current directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_provision() {
        let cli = Cli::try_parse_from(["postinstall", "-v"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_step_lists() {
        let cli = Cli::try_parse_from([
            "postinstall",
            "provision",
            "--dry-run",
            "--only",
            "packages,git",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Provision(args)) => {
                assert!(args.dry_run);
                assert_eq!(args.only.unwrap(), vec!["packages", "git"]);
            }
            _ => panic!("expected provision"),
        }

        assert!(
            Cli::try_parse_from(["postinstall", "provision", "--only", "a", "--skip", "b"])
                .is_err()
        );
    }
}
