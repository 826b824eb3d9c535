//! Interactive prompts for values that are not already known
//!
//! Everything goes through the [`Prompter`] trait so the plan builder and the
//! kernel command can be tested with scripted answers.

use anyhow::{Context, Result, bail};
use dialoguer::{Confirm, Input};

use crate::ui;

/// Attempts before a required value is considered missing
const REQUIRED_ATTEMPTS: usize = 3;

/// Source of answers for interactive questions
pub trait Prompter {
    /// Ask for a line of text; `default` is shown and used for blank input
    fn input(&self, label: &str, default: Option<&str>) -> Result<String>;

    /// Ask a yes/no question
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Terminal prompts
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn input(&self, label: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(label).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string()).show_default(true);
        }
        input
            .interact_text()
            .with_context(|| format!("Failed to read {label}"))
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation")
    }
}

/// No terminal: defaults only, and questions without one stay unanswered
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn input(&self, label: &str, default: Option<&str>) -> Result<String> {
        log::debug!("no terminal, answering '{label}' with its default");
        Ok(default.unwrap_or_default().to_string())
    }

    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool> {
        bail!("'{prompt}' needs a terminal; pass --yes to run unattended")
    }
}

/// Prompter for this process: dialoguer when a user is attached
pub fn for_terminal() -> Box<dyn Prompter> {
    if console::user_attended() {
        Box::new(DialoguerPrompter)
    } else {
        Box::new(NonInteractive)
    }
}

/// Return `existing` or ask until a non-empty answer is given
pub fn require(prompter: &dyn Prompter, label: &str, existing: Option<&str>) -> Result<String> {
    if let Some(value) = existing.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }

    for attempt in 1..=REQUIRED_ATTEMPTS {
        let answer = prompter.input(label, None)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        if attempt < REQUIRED_ATTEMPTS {
            ui::warn(&format!("{label} cannot be empty"));
        }
    }

    bail!("missing required input: {label}")
}

/// Ask with a default; blank input yields the default
pub fn with_default(prompter: &dyn Prompter, label: &str, default: &str) -> Result<String> {
    let answer = prompter.input(label, Some(default))?;
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}

/// 80% of the logical cores, at least one
pub fn default_jobs(cores: usize) -> usize {
    (cores * 4 / 5).max(1)
}

/// Parse a job count; malformed or zero input falls back to the default
pub fn parse_jobs(input: &str, cores: usize) -> usize {
    let default = default_jobs(cores);
    let input = input.trim();
    if input.is_empty() {
        return default;
    }
    match input.parse::<usize>() {
        Ok(0) => {
            ui::warn(&format!("Job count must be at least 1, using {default}"));
            default
        }
        Ok(jobs) => jobs,
        Err(_) => {
            ui::warn(&format!("'{input}' is not a number, using {default} jobs"));
            default
        }
    }
}

/// Ask for the build job count
pub fn jobs(prompter: &dyn Prompter, cores: usize) -> Result<usize> {
    let default = default_jobs(cores).to_string();
    let answer = prompter.input(&format!("Build jobs ({cores} cores)"), Some(&default))?;
    Ok(parse_jobs(&answer, cores))
}
