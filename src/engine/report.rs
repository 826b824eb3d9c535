//! Console progress and the end-of-run summary

use colored::Colorize;
use sequencer::{ApplyResult, ResourceRecord, RunObserver, RunReport, StepRecord, StepStatus};

use crate::ui;

/// Prints step headers and per-resource results as the run progresses
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_step_start(&mut self, index: usize, total: usize, _name: &str, description: &str) {
        println!();
        ui::step(index, total, description);
    }

    fn on_resource_complete(&mut self, _step: &str, record: &ResourceRecord) {
        match &record.result {
            ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
                println!(
                    "  {} {} {}",
                    "✓".green(),
                    record.description,
                    format!("({})", record.result.label()).dimmed()
                );
            }
            ApplyResult::NoChange => {
                if self.verbose {
                    let note = record.note.as_deref().unwrap_or("unchanged");
                    ui::dim(&format!("○ {}: {note}", record.id));
                }
            }
            ApplyResult::Skipped { reason } => {
                println!("  {} {}: {}", "⊘".yellow(), record.id, reason.dimmed());
            }
            ApplyResult::Failed { error } => {
                println!("  {} {}: {}", "✗".red(), record.id, error);
            }
        }
    }

    fn on_step_complete(&mut self, record: &StepRecord) {
        match &record.status {
            StepStatus::Unchanged => ui::dim("○ already in place"),
            StepStatus::Skipped { reason } if record.resources.is_empty() => {
                ui::warn(&format!("Skipped: {reason}"));
            }
            StepStatus::Failed { error } if record.resources.is_empty() => {
                ui::error(&format!("{} failed: {error}", record.name));
            }
            _ => {}
        }
    }
}

fn change_line(record: &ResourceRecord) -> String {
    format!("    + {} ({})", record.description, record.result.label())
}

/// One block of lines per step, plain text so it can go to the log too
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    for step in &report.steps {
        match &step.status {
            StepStatus::Applied => {
                let changes: Vec<_> = step.changes().collect();
                lines.push(format!("✓ {}: {} changed", step.name, changes.len()));
                lines.extend(changes.into_iter().map(change_line));
            }
            StepStatus::Unchanged => {
                lines.push(format!("○ {}: already in place", step.name));
            }
            StepStatus::Skipped { reason } => {
                lines.push(format!("⊘ {}: skipped ({reason})", step.name));
            }
            StepStatus::Failed { error } => {
                lines.push(format!("✗ {}: failed ({error})", step.name));
                lines.extend(step.changes().map(change_line));
            }
        }

        for record in &step.resources {
            match &record.result {
                ApplyResult::NoChange => {
                    if let Some(note) = &record.note {
                        lines.push(format!("    · {}: {note}", record.id));
                    }
                }
                ApplyResult::Skipped { reason } => {
                    lines.push(format!("    ⊘ {}: {reason}", record.id));
                }
                _ => {}
            }
        }
    }
    lines
}

/// Print the end-of-run summary
pub fn print_summary(report: &RunReport, dry_run: bool) {
    ui::header("Summary");
    for line in summary_lines(report) {
        let colored = match line.chars().next() {
            Some('✓') => line.green().to_string(),
            Some('✗') => line.red().to_string(),
            Some('⊘') => line.yellow().to_string(),
            Some('○') => line.normal().to_string(),
            _ => line.dimmed().to_string(),
        };
        println!("  {colored}");
    }

    let totals = report.summary();
    println!();
    if let Some(step) = &report.aborted {
        ui::error(&format!("Stopped at '{step}'; later steps did not run"));
    } else if dry_run {
        ui::info("Dry run: nothing was changed");
    } else if report.warnings().next().is_some() {
        ui::warn(&format!(
            "Finished with warnings ({} changes, {} failed)",
            totals.total_changes(),
            totals.failed
        ));
    } else {
        ui::success(&format!(
            "Finished ({} changes, {} already in place)",
            totals.total_changes(),
            totals.no_change
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer::Criticality;

    fn record(id: &str, result: ApplyResult, note: Option<&str>) -> ResourceRecord {
        ResourceRecord {
            id: id.into(),
            resource_type: "package".into(),
            description: format!("Install {id}"),
            result,
            note: note.map(str::to_string),
        }
    }

    fn step(name: &str, status: StepStatus, resources: Vec<ResourceRecord>) -> StepRecord {
        StepRecord {
            name: name.into(),
            description: String::new(),
            criticality: Criticality::Recoverable,
            status,
            resources,
        }
    }

    #[test]
    fn test_summary_lines() {
        let report = RunReport {
            steps: vec![
                step(
                    "packages",
                    StepStatus::Applied,
                    vec![
                        record("git", ApplyResult::NoChange, Some("already installed")),
                        record("vim", ApplyResult::Created, None),
                    ],
                ),
                step(
                    "debloat",
                    StepStatus::Unchanged,
                    vec![record("firefox", ApplyResult::NoChange, Some("not installed"))],
                ),
                step(
                    "desktop",
                    StepStatus::Skipped {
                        reason: "no active desktop session bus found".into(),
                    },
                    vec![],
                ),
                step(
                    "firewall",
                    StepStatus::Failed {
                        error: "ufw: exit 1".into(),
                    },
                    vec![record("ufw", ApplyResult::Failed { error: "exit 1".into() }, None)],
                ),
            ],
            aborted: None,
        };

        assert_eq!(
            summary_lines(&report),
            vec![
                "✓ packages: 1 changed",
                "    + Install vim (created)",
                "    · git: already installed",
                "○ debloat: already in place",
                "    · firefox: not installed",
                "⊘ desktop: skipped (no active desktop session bus found)",
                "✗ firewall: failed (ufw: exit 1)",
            ]
        );
    }

    #[test]
    fn test_dry_run_lines_show_pending() {
        let report = RunReport {
            steps: vec![step(
                "packages",
                StepStatus::Skipped {
                    reason: "dry run".into(),
                },
                vec![record(
                    "vim",
                    ApplyResult::Skipped {
                        reason: "+ vim".into(),
                    },
                    None,
                )],
            )],
            aborted: None,
        };
        assert_eq!(
            summary_lines(&report),
            vec!["⊘ packages: skipped (dry run)", "    ⊘ vim: + vim"]
        );
    }

    #[test]
    fn test_console_observer_handles_every_result() {
        let mut console = ConsoleObserver::new(true);
        console.on_step_start(1, 1, "packages", "Install essential packages");
        for result in [
            ApplyResult::NoChange,
            ApplyResult::Created,
            ApplyResult::Skipped { reason: "r".into() },
            ApplyResult::Failed { error: "e".into() },
        ] {
            console.on_resource_complete("packages", &record("vim", result, None));
        }
        console.on_step_complete(&step("packages", StepStatus::Unchanged, vec![]));
    }
}
