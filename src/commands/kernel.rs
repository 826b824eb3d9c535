//! `postinstall kernel` - collect build settings and run the build pipeline

use anyhow::{Result, bail};
use indicatif::ProgressBar;
use kernelkit::{BuildConfig, Pipeline, Stage, StageObserver, ToolchainSpec, normalize_defconfig};
use sequencer::SystemRunner;
use std::time::Duration;

use crate::Context;
use crate::cli::KernelArgs;
use crate::progress;
use crate::prompt::{self, Prompter};
use crate::schema::PostinstallConfig;
use crate::ui;

pub fn run(ctx: &Context, args: &KernelArgs) -> Result<()> {
    if !ctx.quiet {
        ui::banner();
    }
    ui::header("Kernel Build");

    let (config, _) = PostinstallConfig::load()?;
    let prompter = prompt::for_terminal();
    let build = resolve(config.kernel, args, prompter.as_ref(), num_cpus::get())?;
    print_settings(&build);

    if !args.yes && !prompter.confirm("Start the build?", true)? {
        bail!("Build cancelled");
    }

    let workdir = match &args.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let runner = SystemRunner::new();
    let source = kernelkit::source::for_spec(&build.toolchain);
    let mut observer = ConsoleStages::default();

    let report = match Pipeline::new(&build, &workdir, &runner, source.as_ref()).run(&mut observer) {
        Ok(report) => report,
        Err(e) => {
            observer.fail(&e.to_string());
            let category = e.category();
            ui::error(category.description());
            ui::dim(category.advice());
            return Err(e.into());
        }
    };

    ui::section("Build Complete");
    ui::kv("Image", &report.artifact.display().to_string());
    ui::kv("Image size", &ui::format_size(report.artifact_size));
    ui::kv("Package", &report.package.display().to_string());
    ui::kv("Package size", &ui::format_size(report.package_size));
    ui::kv("Elapsed", &ui::format_duration(report.elapsed));
    Ok(())
}

/// Fill every unset field from flags, then the config, then the user
///
/// Required values are asked for until given; the defconfig is normalized
/// and the job count defaults to 80% of `cores`.
pub fn resolve(
    mut build: BuildConfig,
    args: &KernelArgs,
    prompter: &dyn Prompter,
    cores: usize,
) -> Result<BuildConfig> {
    let flags = [
        (&mut build.repo, &args.repo),
        (&mut build.branch, &args.branch),
        (&mut build.dir, &args.dir),
        (&mut build.defconfig, &args.defconfig),
    ];
    for (field, flag) in flags {
        if let Some(value) = flag {
            field.clone_from(value);
        }
    }
    if let Some(url) = &args.toolchain_url {
        build.toolchain = ToolchainSpec::Url { url: url.clone() };
    }
    if let Some(jobs) = args.jobs {
        build.jobs = jobs;
    }

    build.repo = prompt::require(prompter, "Kernel repository URL", non_empty(&build.repo))?;
    build.branch = prompt::require(prompter, "Branch", non_empty(&build.branch))?;
    if build.dir.trim().is_empty() {
        let default = default_dir(&build.repo);
        build.dir = prompt::with_default(prompter, "Source directory", &default)?;
    }
    let defconfig = prompt::require(prompter, "Defconfig", non_empty(&build.defconfig))?;
    build.defconfig = normalize_defconfig(&defconfig);
    if build.missing().contains(&"toolchain") {
        let url = prompt::require(prompter, "Toolchain archive URL (.tar.gz or .tar.zst)", None)?;
        build.toolchain = ToolchainSpec::Url { url };
    }
    if build.jobs == 0 {
        build.jobs = prompt::jobs(prompter, cores)?;
    }

    Ok(build.validate()?)
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// `https://github.com/acme/linux-stone.git` → `linux-stone`
fn default_dir(repo: &str) -> String {
    let name = repo
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");
    if name.is_empty() {
        "kernel".to_string()
    } else {
        name.to_string()
    }
}

fn print_settings(build: &BuildConfig) {
    ui::section("Settings");
    ui::kv("Repository", &format!("{} ({})", build.repo, build.branch));
    ui::kv("Directory", &build.dir);
    ui::kv("Defconfig", &build.defconfig);
    ui::kv("Architecture", &build.arch);
    ui::kv("Jobs", &build.jobs.to_string());
}

/// Spinners for quiet stages; stages that stream `git`/`make` output get a
/// plain header so the spinner does not fight with it
#[derive(Default)]
struct ConsoleStages {
    spinner: Option<ProgressBar>,
}

fn streams_output(stage: Stage) -> bool {
    matches!(
        stage,
        Stage::CloneKernelSource | Stage::CloneExtraAssets | Stage::Defconfig | Stage::Compile
    )
}

impl ConsoleStages {
    fn fail(&mut self, message: &str) {
        if let Some(pb) = self.spinner.take() {
            progress::finish_error(&pb, message);
        }
    }
}

impl StageObserver for ConsoleStages {
    fn on_stage_start(&mut self, stage: Stage) {
        if streams_output(stage) {
            ui::step(stage.number(), Stage::ALL.len(), stage.label());
        } else {
            self.spinner = Some(progress::spinner(stage.label()));
        }
    }

    fn on_stage_complete(&mut self, stage: Stage, elapsed: Duration) {
        let message = format!("{stage} ({})", ui::format_duration(elapsed));
        match self.spinner.take() {
            Some(pb) => progress::finish_success(&pb, &message),
            None => ui::success(&message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::ScriptedPrompter;

    #[test]
    fn test_resolve_asks_only_for_missing() {
        let mut config = BuildConfig::default();
        config.repo = "https://github.com/acme/linux-stone.git".into();
        config.toolchain = ToolchainSpec::Url {
            url: "https://example.org/clang.tar.zst".into(),
        };
        let args = KernelArgs {
            branch: Some("lineage-21".into()),
            ..Default::default()
        };
        // Source directory (blank → default), defconfig, jobs
        let prompter = ScriptedPrompter::new(&["", "stone", "16"]);

        let build = resolve(config, &args, &prompter, 8).unwrap();
        assert_eq!(build.branch, "lineage-21");
        assert_eq!(build.dir, "linux-stone");
        assert_eq!(build.defconfig, "stone_defconfig");
        assert_eq!(build.jobs, 16);
        assert_eq!(
            prompter.asked(),
            vec!["Source directory", "Defconfig", "Build jobs (8 cores)"]
        );
    }

    #[test]
    fn test_resolve_from_flags_needs_no_prompts() {
        let args = KernelArgs {
            repo: Some("https://github.com/acme/kernel".into()),
            branch: Some("main".into()),
            dir: Some("src".into()),
            defconfig: Some("x_defconfig".into()),
            toolchain_url: Some("https://example.org/clang.tar.gz".into()),
            jobs: Some(4),
            ..Default::default()
        };
        let prompter = ScriptedPrompter::new(&[]);
        let build = resolve(BuildConfig::default(), &args, &prompter, 8).unwrap();
        assert!(prompter.asked().is_empty());
        assert_eq!(build.defconfig, "x_defconfig");
        assert_eq!(build.jobs, 4);
    }

    #[test]
    fn test_bad_job_input_uses_default() {
        let args = KernelArgs {
            repo: Some("https://github.com/acme/kernel".into()),
            branch: Some("main".into()),
            dir: Some("src".into()),
            defconfig: Some("x".into()),
            toolchain_url: Some("https://example.org/clang.tar.gz".into()),
            ..Default::default()
        };
        let prompter = ScriptedPrompter::new(&["abc"]);
        let build = resolve(BuildConfig::default(), &args, &prompter, 10).unwrap();
        assert_eq!(build.jobs, 8);
    }

    #[test]
    fn test_missing_repo_is_fatal() {
        let prompter = ScriptedPrompter::new(&[]);
        let err = resolve(BuildConfig::default(), &KernelArgs::default(), &prompter, 8).unwrap_err();
        assert!(err.to_string().contains("missing required input"));
    }

    #[test]
    fn test_default_dir() {
        assert_eq!(default_dir("https://github.com/acme/linux-stone.git"), "linux-stone");
        assert_eq!(default_dir("https://github.com/acme/kernel/"), "kernel");
        assert_eq!(default_dir(""), "kernel");
    }
}
