//! The linear build pipeline.
//!
//! Each stage either completes or aborts the build; there is no partial
//! success. Directories a previous interrupted run may have left behind are
//! removed before they are recreated.

use crate::archive::{self, ArchiveFormat};
use crate::config::{ANYKERNEL_DIR, BuildConfig};
use crate::error::{Error, Result};
use crate::source::ToolchainSource;
use crate::stage::Stage;
use crate::tools;
use chrono::NaiveDateTime;
use sequencer::{CommandRunner, CommandSpec};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Progress callbacks.
pub trait StageObserver {
    fn on_stage_start(&mut self, _stage: Stage) {}
    fn on_stage_complete(&mut self, _stage: Stage, _elapsed: Duration) {}
}

impl StageObserver for () {}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub artifact: PathBuf,
    pub artifact_size: u64,
    pub package: PathBuf,
    pub package_size: u64,
    pub elapsed: Duration,
}

/// `kernel` + 2024-05-01 13:04:05 → `kernel-20240501-130405.zip`
pub fn package_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{prefix}-{}.zip", at.format("%Y%m%d-%H%M%S"))
}

/// Runs every stage after [`Stage::Configure`] for a resolved config.
pub struct Pipeline<'a> {
    config: &'a BuildConfig,
    workdir: PathBuf,
    runner: &'a dyn CommandRunner,
    source: &'a dyn ToolchainSource,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a BuildConfig,
        workdir: impl Into<PathBuf>,
        runner: &'a dyn CommandRunner,
        source: &'a dyn ToolchainSource,
    ) -> Self {
        Self {
            config,
            workdir: workdir.into(),
            runner,
            source,
        }
    }

    fn kernel_dir(&self) -> PathBuf {
        self.workdir.join(&self.config.dir)
    }

    fn boot_dir(&self) -> PathBuf {
        self.kernel_dir()
            .join("out/arch")
            .join(&self.config.arch)
            .join("boot")
    }

    /// Run the build.
    pub fn run(&self, observer: &mut dyn StageObserver) -> Result<BuildReport> {
        let started = Instant::now();

        self.stage(Stage::Configure, observer, || {
            let missing = self.config.missing();
            if !missing.is_empty() {
                return Err(Error::Config(format!("missing {}", missing.join(", "))));
            }
            self.config.check_dirs()
        })?;
        let bin = self.stage(Stage::FetchToolchain, observer, || self.fetch_toolchain())?;
        self.stage(Stage::CloneKernelSource, observer, || {
            self.clone(
                Stage::CloneKernelSource,
                &self.config.repo,
                &self.config.branch,
                &self.config.dir,
            )
        })?;
        self.stage(Stage::CloneExtraAssets, observer, || self.clone_extras())?;
        self.stage(Stage::Defconfig, observer, || {
            let spec = self.make(&bin).arg(&self.config.defconfig);
            self.exec(Stage::Defconfig, &spec)
        })?;
        self.stage(Stage::Compile, observer, || {
            let spec = self.make(&bin).arg(format!("-j{}", self.config.jobs.max(1)));
            self.exec(Stage::Compile, &spec)
        })?;
        let artifact = self.stage(Stage::LocateArtifact, observer, || self.locate_artifact())?;
        let package = self.stage(Stage::Package, observer, || {
            self.package(&artifact, chrono::Local::now().naive_local())
        })?;
        self.stage(Stage::Report, observer, || {
            let artifact_size = fs::metadata(&artifact)
                .map_err(|e| Error::io(&artifact, e))?
                .len();
            let package_size = fs::metadata(&package)
                .map_err(|e| Error::io(&package, e))?
                .len();
            Ok(BuildReport {
                artifact: artifact.clone(),
                artifact_size,
                package: package.clone(),
                package_size,
                elapsed: started.elapsed(),
            })
        })
    }

    fn stage<T>(
        &self,
        stage: Stage,
        observer: &mut dyn StageObserver,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        log::info!("[{}/{}] {stage}", stage.number(), Stage::ALL.len());
        observer.on_stage_start(stage);
        let started = Instant::now();
        let value = f()?;
        observer.on_stage_complete(stage, started.elapsed());
        Ok(value)
    }

    /// Download, unpack and verify the toolchain. Returns its `bin` directory.
    fn fetch_toolchain(&self) -> Result<PathBuf> {
        log::info!("fetching toolchain from {}", self.source.describe());
        let fetched = self.source.fetch()?;
        let format = ArchiveFormat::from_name(&fetched.name).ok_or_else(|| {
            Error::Archive(format!(
                "unsupported toolchain archive '{}' (expected .tar.gz or .tar.zst)",
                fetched.name
            ))
        })?;

        let dest = self.workdir.join(&self.config.toolchain_dir);
        archive::extract(&fetched.bytes, format, &dest)?;
        let bin = archive::toolchain_root(&dest)?.join("bin");
        tools::verify_tools(&bin, &self.config.required_tools)?;
        Ok(bin)
    }

    fn clone(&self, stage: Stage, url: &str, branch: &str, dir: &str) -> Result<()> {
        let target = self.workdir.join(dir);
        if target.exists() {
            log::debug!("removing existing {}", target.display());
            fs::remove_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        }
        fs::create_dir_all(&self.workdir).map_err(|e| Error::io(&self.workdir, e))?;

        let spec = CommandSpec::new("git")
            .args(["clone", "--depth=1", "--branch", branch, url, dir])
            .cwd(&self.workdir)
            .streaming();
        self.exec(stage, &spec)
    }

    fn clone_extras(&self) -> Result<()> {
        self.clone(
            Stage::CloneExtraAssets,
            &self.config.anykernel_repo,
            &self.config.anykernel_branch,
            ANYKERNEL_DIR,
        )?;
        for extra in &self.config.extra_repos {
            self.clone(Stage::CloneExtraAssets, &extra.url, &extra.branch, &extra.dir)?;
        }
        Ok(())
    }

    /// `make` with the toolchain on `PATH` and the cross-compile variables set.
    fn make(&self, bin: &Path) -> CommandSpec {
        let path = match std::env::var("PATH") {
            Ok(existing) if !existing.is_empty() => format!("{}:{existing}", bin.display()),
            _ => bin.display().to_string(),
        };
        let mut spec = CommandSpec::new("make")
            .args([
                "O=out".to_string(),
                format!("ARCH={}", self.config.arch),
                "LLVM=1".to_string(),
                "LLVM_IAS=1".to_string(),
                format!("CROSS_COMPILE={}", self.config.cross_compile),
            ])
            .env("PATH", path)
            .cwd(self.kernel_dir())
            .streaming();
        if !self.config.cross_compile_arm32.is_empty() {
            spec = spec.arg(format!(
                "CROSS_COMPILE_ARM32={}",
                self.config.cross_compile_arm32
            ));
        }
        spec
    }

    fn exec(&self, stage: Stage, spec: &CommandSpec) -> Result<()> {
        let output = self
            .runner
            .run(spec)
            .map_err(|e| Error::command(stage, format!("{e:#}")))?;
        output
            .check(spec)
            .map(|_| ())
            .map_err(|e| Error::command(stage, format!("{e:#}")))
    }

    /// First configured image that exists. Missing images fail the build even
    /// when `make` exited successfully.
    fn locate_artifact(&self) -> Result<PathBuf> {
        let boot = self.boot_dir();
        self.config
            .image_names
            .iter()
            .map(|name| boot.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::ArtifactMissing {
                dir: boot,
                names: self.config.image_names.clone(),
            })
    }

    fn package(&self, artifact: &Path, at: NaiveDateTime) -> Result<PathBuf> {
        let anykernel = self.workdir.join(ANYKERNEL_DIR);
        let file_name = artifact
            .file_name()
            .ok_or_else(|| Error::Archive(format!("bad artifact path {}", artifact.display())))?;
        let copied = anykernel.join(file_name);
        fs::copy(artifact, &copied).map_err(|e| Error::io(&copied, e))?;

        let out = self.workdir.join(package_name(&self.config.zip_name, at));
        let size = archive::zip_dir(&anykernel, &out)?;
        log::info!("packaged {} ({size} bytes)", out.display());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtraRepo, ToolchainSpec};
    use crate::source::MockSource;
    use sequencer::CommandOutput;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Pretends to be git and make: clones create directories, compiles drop
    /// an image into the boot directory.
    struct FakeBuild {
        image: Option<&'static str>,
        make_exit: i32,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl FakeBuild {
        fn new(image: Option<&'static str>) -> Self {
            Self {
                image,
                make_exit: 0,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn lines(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.argv().join(" "))
                .collect()
        }
    }

    impl CommandRunner for FakeBuild {
        fn run(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            let cwd = spec.cwd.clone().unwrap();
            if spec.program == "git" {
                let dir = cwd.join(spec.args.last().unwrap());
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join("README"), "cloned").unwrap();
            } else if spec.program == "make" && spec.args.iter().any(|a| a.starts_with("-j")) {
                if self.make_exit != 0 {
                    return Ok(CommandOutput::failure(self.make_exit, "error: ld failed"));
                }
                if let Some(image) = self.image {
                    let boot = cwd.join("out/arch/arm64/boot");
                    fs::create_dir_all(&boot).unwrap();
                    fs::write(boot.join(image), "kernel image").unwrap();
                }
            }
            Ok(CommandOutput::ok(""))
        }
    }

    fn toolchain_tarball() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for tool in ["clang", "ld.lld"] {
            let mut header = tar::Header::new_gnu();
            header.set_size(3);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("bin/{tool}"), &b"elf"[..])
                .unwrap();
        }
        let tar = builder.into_inner().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(&tar).unwrap();
        encoder.finish().unwrap()
    }

    fn config() -> BuildConfig {
        BuildConfig {
            repo: "https://github.com/example/kernel".into(),
            branch: "main".into(),
            dir: "kernel".into(),
            defconfig: "stone_defconfig".into(),
            jobs: 6,
            toolchain: ToolchainSpec::Url {
                url: "https://example.com/clang.tar.gz".into(),
            },
            ..BuildConfig::default()
        }
    }

    #[derive(Default)]
    struct Stages(Vec<Stage>);

    impl StageObserver for Stages {
        fn on_stage_complete(&mut self, stage: Stage, _elapsed: Duration) {
            self.0.push(stage);
        }
    }

    #[test]
    fn test_package_name() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(13, 4, 5)
            .unwrap();
        assert_eq!(package_name("kernel", at), "kernel-20240501-130405.zip");
    }

    #[test]
    fn test_full_build() {
        let temp = TempDir::new().unwrap();
        let config = config();
        let runner = FakeBuild::new(Some("Image.gz"));
        let source = MockSource::new("clang.tar.gz", toolchain_tarball());
        let mut stages = Stages::default();

        let report = Pipeline::new(&config, temp.path(), &runner, &source)
            .run(&mut stages)
            .unwrap();

        assert_eq!(stages.0, Stage::ALL.to_vec());
        assert!(report.artifact.ends_with("kernel/out/arch/arm64/boot/Image.gz"));
        assert!(report.package_size > 0);
        let name = report.package.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("kernel-") && name.ends_with(".zip"));
        assert!(temp.path().join("AnyKernel3/Image.gz").is_file());

        let lines = runner.lines();
        assert_eq!(
            lines[0],
            "git clone --depth=1 --branch main https://github.com/example/kernel kernel"
        );
        assert_eq!(
            lines[1],
            "git clone --depth=1 --branch master https://github.com/osm0sis/AnyKernel3 AnyKernel3"
        );
        assert_eq!(
            lines[2],
            "make O=out ARCH=arm64 LLVM=1 LLVM_IAS=1 CROSS_COMPILE=aarch64-linux-gnu- \
             CROSS_COMPILE_ARM32=arm-linux-gnueabi- stone_defconfig"
        );
        assert!(lines[3].ends_with("-j6"));

        let calls = runner.calls.lock().unwrap();
        let path = calls[2].env.iter().find(|(k, _)| k == "PATH").unwrap();
        assert!(path.1.starts_with(&temp.path().join("toolchain/bin").display().to_string()));
    }

    #[test]
    fn test_missing_artifact_is_fatal_even_if_make_succeeds() {
        let temp = TempDir::new().unwrap();
        let config = config();
        let runner = FakeBuild::new(None);
        let source = MockSource::new("clang.tar.gz", toolchain_tarball());

        let err = Pipeline::new(&config, temp.path(), &runner, &source)
            .run(&mut ())
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactMissing { .. }));
    }

    #[test]
    fn test_first_configured_image_wins() {
        let temp = TempDir::new().unwrap();
        let config = config();
        let boot = temp.path().join("kernel/out/arch/arm64/boot");
        fs::create_dir_all(&boot).unwrap();
        fs::write(boot.join("Image"), "raw").unwrap();
        fs::write(boot.join("Image.gz-dtb"), "dtb").unwrap();

        let runner = FakeBuild::new(None);
        let source = MockSource::new("clang.tar.gz", toolchain_tarball());
        let pipeline = Pipeline::new(&config, temp.path(), &runner, &source);
        assert_eq!(pipeline.locate_artifact().unwrap(), boot.join("Image.gz-dtb"));
    }

    #[test]
    fn test_compile_failure_names_stage() {
        let temp = TempDir::new().unwrap();
        let config = config();
        let mut runner = FakeBuild::new(Some("Image"));
        runner.make_exit = 2;
        let source = MockSource::new("clang.tar.gz", toolchain_tarball());

        let err = Pipeline::new(&config, temp.path(), &runner, &source)
            .run(&mut ())
            .unwrap_err();
        assert!(matches!(err, Error::Command { stage: Stage::Compile, .. }));
        assert!(err.to_string().starts_with("compile failed"));
    }

    #[test]
    fn test_missing_toolchain_binary_stops_before_clone() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig {
            required_tools: vec!["clang".into(), "aarch64-linux-gnu-gcc".into()],
            ..config()
        };
        let runner = FakeBuild::new(Some("Image"));
        let source = MockSource::new("clang.tar.gz", toolchain_tarball());

        let err = Pipeline::new(&config, temp.path(), &runner, &source)
            .run(&mut ())
            .unwrap_err();
        assert!(matches!(err, Error::ToolMissing { .. }));
        assert!(runner.lines().is_empty());
    }

    #[test]
    fn test_existing_clone_is_replaced() {
        let temp = TempDir::new().unwrap();
        let stale = temp.path().join("kernel");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.o"), "x").unwrap();

        let config = BuildConfig {
            extra_repos: vec![ExtraRepo {
                url: "https://github.com/example/modules".into(),
                branch: "main".into(),
                dir: "modules".into(),
            }],
            ..config()
        };
        let runner = FakeBuild::new(Some("Image"));
        let source = MockSource::new("clang.tar.gz", toolchain_tarball());
        Pipeline::new(&config, temp.path(), &runner, &source)
            .run(&mut ())
            .unwrap();

        assert!(!stale.join("leftover.o").exists());
        assert!(temp.path().join("modules/README").is_file());
        let mode = fs::metadata(temp.path().join("toolchain/bin/clang"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[test]
    fn test_unsafe_extra_dir_leaves_workdir_alone() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("precious.txt"), "keep").unwrap();

        for dir in ["", ".", "AnyKernel3"] {
            let config = BuildConfig {
                extra_repos: vec![ExtraRepo {
                    url: "https://github.com/example/modules".into(),
                    branch: "main".into(),
                    dir: dir.into(),
                }],
                ..config()
            };
            let runner = FakeBuild::new(Some("Image"));
            let source = MockSource::new("clang.tar.gz", toolchain_tarball());

            let err = Pipeline::new(&config, temp.path(), &runner, &source)
                .run(&mut ())
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{dir:?}: {err}");
            assert!(runner.lines().is_empty());
        }
        assert!(temp.path().join("precious.txt").is_file());
        assert!(!temp.path().join("toolchain").exists());
    }

    #[test]
    fn test_unsupported_archive_name() {
        let temp = TempDir::new().unwrap();
        let config = config();
        let runner = FakeBuild::new(Some("Image"));
        let source = MockSource::new("clang.7z", vec![0]);

        let err = Pipeline::new(&config, temp.path(), &runner, &source)
            .run(&mut ())
            .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }
}
