//! Run log file
//!
//! Duplicates every step and resource outcome into
//! `postinstall-YYYYMMDD-HHMMSS.log` so a run can be reviewed afterwards.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use sequencer::{ApplyResult, ResourceRecord, RunObserver, StepRecord, StepStatus};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Log file name for a run started at `started`
pub fn file_name(started: NaiveDateTime) -> String {
    format!("postinstall-{}.log", started.format("%Y%m%d-%H%M%S"))
}

/// Append-only log of one provisioning run
pub struct RunLog {
    path: PathBuf,
    out: BufWriter<File>,
    write_failed: bool,
}

impl RunLog {
    /// Create the log file in `dir`
    pub fn create(dir: &Path) -> Result<Self> {
        let path = dir.join(file_name(Local::now().naive_local()));
        Self::create_at(path)
    }

    /// Create the log file at an explicit path
    pub fn create_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Could not create run log {}", path.display()))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            write_failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one timestamped line
    pub fn line(&mut self, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let result = writeln!(self.out, "[{stamp}] {message}").and_then(|()| self.out.flush());
        if let Err(e) = result
            && !self.write_failed
        {
            // Only report the first failure; the run itself goes on
            log::warn!("could not write run log {}: {e}", self.path.display());
            self.write_failed = true;
        }
    }
}

fn describe_result(result: &ApplyResult) -> String {
    match result {
        ApplyResult::Failed { error } => format!("failed: {error}"),
        ApplyResult::Skipped { reason } => format!("skipped: {reason}"),
        other => other.label().to_string(),
    }
}

impl RunObserver for RunLog {
    fn on_step_start(&mut self, index: usize, total: usize, name: &str, description: &str) {
        self.line(&format!("step {index}/{total} {name}: {description}"));
    }

    fn on_resource_complete(&mut self, step: &str, record: &ResourceRecord) {
        let mut message = format!(
            "  {step} {} {} -> {}",
            record.resource_type,
            record.id,
            describe_result(&record.result)
        );
        if let Some(note) = &record.note {
            message.push_str(&format!(" ({note})"));
        }
        self.line(&message);
    }

    fn on_step_complete(&mut self, record: &StepRecord) {
        let status = match &record.status {
            StepStatus::Applied => "applied".to_string(),
            StepStatus::Unchanged => "unchanged".to_string(),
            StepStatus::Skipped { reason } => format!("skipped: {reason}"),
            StepStatus::Failed { error } => {
                format!("FAILED ({}): {error}", record.criticality.label())
            }
        };
        self.line(&format!("step {} {status}", record.name));
    }
}
