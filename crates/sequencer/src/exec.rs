//! External command execution
//!
//! Everything the provisioner does to the host goes through a
//! [`CommandRunner`]. The system runner resolves privilege and target-user
//! switching into a concrete argv; the scripted runner stands in for the
//! host in tests.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

/// Run a command as another (unprivileged) user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAs {
    pub user: String,
    pub uid: u32,
    /// Extra environment for the target user (session bus address, HOME)
    pub env: Vec<(String, String)>,
}

/// A command to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    /// Needs root
    pub privileged: bool,
    pub run_as: Option<RunAs>,
    pub cwd: Option<PathBuf>,
    /// Inherit stdout/stderr instead of capturing
    pub streaming: bool,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn run_as(mut self, target: RunAs) -> Self {
        self.run_as = Some(target);
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Printable form for logs and error messages
    pub fn display(&self) -> String {
        self.argv().join(" ")
    }
}

/// Captured result of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (None if killed by a signal)
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            success: true,
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failure(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            success: false,
        }
    }

    /// Get stdout as string (lossy)
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as string (lossy)
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Turn a non-zero exit into an error mentioning the command
    pub fn check(self, spec: &CommandSpec) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let stderr = self.stderr_str();
        let detail = stderr.trim();
        match self.code {
            Some(code) if detail.is_empty() => {
                anyhow::bail!("`{}` exited with status {code}", spec.display())
            }
            Some(code) => anyhow::bail!("`{}` exited with status {code}: {detail}", spec.display()),
            None => anyhow::bail!("`{}` was terminated by a signal", spec.display()),
        }
    }
}

/// Something that can run commands on the host
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion
    ///
    /// A non-zero exit is not an error here; callers decide using
    /// [`CommandOutput::success`] or [`CommandOutput::check`]. Errors are
    /// reserved for commands that could not be started at all.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

impl std::fmt::Debug for dyn CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CommandRunner")
    }
}

/// Concrete argv and environment after privilege resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    /// Environment set on the spawned process itself
    pub env: Vec<(String, String)>,
}

/// Runs real processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    euid: u32,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        #[allow(unsafe_code)]
        // SAFETY: geteuid has no preconditions and cannot fail
        let euid = unsafe { libc::geteuid() };
        Self { euid }
    }

    /// Runner that behaves as if running with the given effective uid
    pub fn with_euid(euid: u32) -> Self {
        Self { euid }
    }

    pub fn is_root(&self) -> bool {
        self.euid == 0
    }

    /// Resolve how a spec is actually spawned
    ///
    /// - run as another user: `runuser -u` when root, else `sudo -u`, with
    ///   the user's environment passed through `env`
    /// - privileged and not root: `sudo --`
    /// - otherwise the program directly
    pub fn invocation(&self, spec: &CommandSpec) -> Invocation {
        if let Some(target) = &spec.run_as
            && target.uid != self.euid
        {
            let mut argv: Vec<String> = if self.is_root() {
                vec!["runuser".into(), "-u".into(), target.user.clone(), "--".into()]
            } else {
                vec!["sudo".into(), "-u".into(), target.user.clone(), "--".into()]
            };
            argv.push("env".into());
            argv.extend(
                target
                    .env
                    .iter()
                    .chain(spec.env.iter())
                    .map(|(k, v)| format!("{k}={v}")),
            );
            argv.extend(spec.argv());
            return Invocation {
                argv,
                env: Vec::new(),
            };
        }

        let mut env = spec.env.clone();
        if let Some(target) = &spec.run_as {
            // Already the target user; set its environment directly
            env.splice(0..0, target.env.iter().cloned());
        }

        if spec.privileged && !self.is_root() {
            let mut argv: Vec<String> = vec!["sudo".into(), "--".into()];
            if !env.is_empty() {
                argv.push("env".into());
                argv.extend(env.iter().map(|(k, v)| format!("{k}={v}")));
            }
            argv.extend(spec.argv());
            return Invocation {
                argv,
                env: Vec::new(),
            };
        }

        Invocation {
            argv: spec.argv(),
            env,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let invocation = self.invocation(spec);
        log::debug!("exec: {}", invocation.argv.join(" "));

        let (program, args) = invocation
            .argv
            .split_first()
            .context("Empty command line")?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        if spec.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else if spec.streaming {
            cmd.stdin(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null());
        }

        if spec.streaming {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to execute: {}", spec.display()))?;

        // Feed stdin while the output pipes are drained, or a child that
        // echoes its input (tee) blocks once both pipe buffers fill up
        let pipe = child.stdin.take();
        let output = std::thread::scope(|scope| {
            let writer = spec
                .stdin
                .as_deref()
                .zip(pipe)
                .map(|(input, mut pipe)| scope.spawn(move || pipe.write_all(input)));
            let output = child.wait_with_output();
            if let Some(writer) = writer {
                match writer.join() {
                    Ok(Ok(())) => {}
                    // The child exited without reading everything; its status says why
                    Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                    Ok(Err(e)) => {
                        return Err(anyhow::Error::new(e)
                            .context(format!("Failed to write stdin of {}", spec.program)));
                    }
                    Err(_) => anyhow::bail!("stdin writer for {} panicked", spec.program),
                }
            }
            output.with_context(|| format!("Failed to wait for {}", spec.program))
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        })
    }
}

/// Test double that returns canned output by argv prefix
///
/// Later registrations win over earlier ones, so a test can set a broad
/// default and then override one specific command.
#[derive(Debug)]
pub struct ScriptedRunner {
    responses: Mutex<Vec<(Vec<String>, CommandOutput)>>,
    calls: Mutex<Vec<CommandSpec>>,
    fallback: CommandOutput,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    /// Unmatched commands succeed with empty output
    pub fn new() -> Self {
        Self::with_fallback(CommandOutput::ok(""))
    }

    /// Unmatched commands return `fallback`
    pub fn with_fallback(fallback: CommandOutput) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fallback,
        }
    }

    /// Register output for commands whose argv starts with `prefix`
    pub fn on(&self, prefix: &[&str], output: CommandOutput) -> &Self {
        let prefix = prefix.iter().map(|s| (*s).to_string()).collect();
        if let Ok(mut responses) = self.responses.lock() {
            responses.push((prefix, output));
        }
        self
    }

    /// Every command run so far
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Every command line run so far, joined with spaces
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    /// Number of calls whose argv starts with `prefix`
    pub fn count_matching(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|spec| starts_with(&spec.argv(), prefix))
            .count()
    }
}

fn starts_with<S: AsRef<str>>(argv: &[String], prefix: &[S]) -> bool {
    argv.len() >= prefix.len() && argv.iter().zip(prefix).all(|(a, p)| a == p.as_ref())
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        let argv = spec.argv();
        let responses = self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted runner poisoned"))?;
        let output = responses
            .iter()
            .rev()
            .find(|(prefix, _)| starts_with(&argv, prefix))
            .map_or_else(|| self.fallback.clone(), |(_, out)| out.clone());
        Ok(output)
    }
}
