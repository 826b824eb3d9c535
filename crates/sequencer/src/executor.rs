//! Execution engine - runs steps in order and records every outcome

use crate::context::{ApplyContext, RunObserver};
use crate::diff::ResourceDiff;
use crate::plan::{Plan, Step, StepBody};
use crate::resource::Resource;
use crate::types::{
    ApplyResult, Criticality, ExecuteOptions, ResourceRecord, RunReport, StepRecord, StepStatus,
};

/// Execute a plan
///
/// Steps run strictly in order. A failed recoverable step is recorded and
/// the run continues; a failed fatal step stops the run and is named in
/// [`RunReport::aborted`]. Nothing is retried.
pub fn execute<O: RunObserver>(plan: Plan, opts: &ExecuteOptions, observer: &mut O) -> RunReport {
    let mut report = RunReport::default();
    let total = plan.steps.len();

    for (index, step) in plan.steps.into_iter().enumerate() {
        observer.on_step_start(index + 1, total, &step.name, &step.description);

        let record = run_step(step, opts, observer);
        observer.on_step_complete(&record);

        let fatal = record.status.is_failure() && record.criticality == Criticality::Fatal;
        if let StepStatus::Failed { error } = &record.status {
            if fatal {
                log::error!("step '{}' failed: {}", record.name, error);
            } else {
                log::warn!("step '{}' failed, continuing: {}", record.name, error);
            }
        }

        let name = record.name.clone();
        report.steps.push(record);
        if fatal {
            report.aborted = Some(name);
            break;
        }
    }

    report
}

fn run_step<O: RunObserver>(step: Step, opts: &ExecuteOptions, observer: &mut O) -> StepRecord {
    let Step {
        name,
        description,
        criticality,
        body,
    } = step;

    let resources = match body {
        StepBody::Resources(resources) => resources,
        StepBody::Unavailable { reason } if criticality == Criticality::Fatal => {
            return StepRecord {
                name,
                description,
                criticality,
                status: StepStatus::Failed { error: reason },
                resources: Vec::new(),
            };
        }
        StepBody::Skip { reason } | StepBody::Unavailable { reason } => {
            log::warn!("skipping step '{name}': {reason}");
            return StepRecord {
                name,
                description,
                criticality,
                status: StepStatus::Skipped { reason },
                resources: Vec::new(),
            };
        }
    };

    let mut ctx = ApplyContext::new(opts.dry_run, opts.verbose);
    let mut records = Vec::with_capacity(resources.len());
    for resource in &resources {
        let record = converge(resource.as_ref(), &mut ctx);
        log::debug!("{}: {} -> {}", name, record.id, record.result.label());
        observer.on_resource_complete(&name, &record);
        records.push(record);
    }

    let failures: Vec<String> = records
        .iter()
        .filter_map(|r| match &r.result {
            ApplyResult::Failed { error } => Some(format!("{}: {}", r.id, error)),
            _ => None,
        })
        .collect();

    let status = if !failures.is_empty() {
        StepStatus::Failed {
            error: failures.join("; "),
        }
    } else if opts.dry_run
        && records
            .iter()
            .any(|r| matches!(r.result, ApplyResult::Skipped { .. }))
    {
        StepStatus::Skipped {
            reason: "dry run".to_string(),
        }
    } else if records.iter().any(|r| r.result.is_change()) {
        StepStatus::Applied
    } else {
        StepStatus::Unchanged
    };

    StepRecord {
        name,
        description,
        criticality,
        status,
        resources: records,
    }
}

/// Bring one resource to its desired state
fn converge(resource: &dyn Resource, ctx: &mut ApplyContext) -> ResourceRecord {
    let mut record = ResourceRecord {
        id: resource.id(),
        resource_type: resource.resource_type().to_string(),
        description: resource.description(),
        result: ApplyResult::NoChange,
        note: None,
    };

    let diff = match ResourceDiff::from_resource(resource) {
        Ok(diff) => diff,
        Err(e) => {
            record.result = ApplyResult::Failed {
                error: format!("{e:#}"),
            };
            return record;
        }
    };

    let Some(diff) = diff else {
        record.note = resource.converged_note();
        return record;
    };

    if ctx.dry_run {
        record.result = ApplyResult::Skipped {
            reason: diff.render(),
        };
        return record;
    }

    record.result = match resource.apply(ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    };
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoObserver;
    use crate::types::ResourceState;
    use anyhow::Result;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Resource with a fixed current state and a configurable apply outcome
    #[derive(Debug)]
    struct TestResource {
        id: String,
        present: bool,
        fail: bool,
        applied: Rc<Cell<usize>>,
    }

    impl TestResource {
        fn boxed(id: &str, present: bool, fail: bool, applied: &Rc<Cell<usize>>) -> Box<Self> {
            Box::new(Self {
                id: id.to_string(),
                present,
                fail,
                applied: Rc::clone(applied),
            })
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> Result<ResourceState> {
            if self.present {
                Ok(ResourceState::Present { details: None })
            } else {
                Ok(ResourceState::Absent)
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.applied.set(self.applied.get() + 1);
            if self.fail {
                anyhow::bail!("Simulated failure");
            }
            Ok(ApplyResult::Created)
        }

        fn converged_note(&self) -> Option<String> {
            Some("already configured".to_string())
        }
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<String>,
        resources: usize,
        completed: Vec<String>,
    }

    impl RunObserver for Recorder {
        fn on_step_start(&mut self, _index: usize, _total: usize, name: &str, _description: &str) {
            self.started.push(name.to_string());
        }
        fn on_resource_complete(&mut self, _step: &str, _record: &ResourceRecord) {
            self.resources += 1;
        }
        fn on_step_complete(&mut self, record: &StepRecord) {
            self.completed.push(record.name.clone());
        }
    }

    #[test]
    fn test_converged_resource_not_applied() {
        let applied = Rc::new(Cell::new(0));
        let mut plan = Plan::new();
        plan.push(
            Step::new("git", "Configure git", Criticality::Recoverable)
                .with_resource(TestResource::boxed("user.name", true, false, &applied)),
        );

        let report = execute(plan, &ExecuteOptions::default(), &mut NoObserver);

        assert_eq!(applied.get(), 0);
        let step = report.step("git").unwrap();
        assert_eq!(step.status, StepStatus::Unchanged);
        let record = step.resource("user.name").unwrap();
        assert_eq!(record.result, ApplyResult::NoChange);
        assert_eq!(record.note.as_deref(), Some("already configured"));
    }

    #[test]
    fn test_recoverable_failure_continues() {
        let applied = Rc::new(Cell::new(0));
        let mut plan = Plan::new();
        plan.push(
            Step::new("flatpak", "", Criticality::Recoverable)
                .with_resource(TestResource::boxed("remote", false, true, &applied)),
        );
        plan.push(
            Step::new("packages", "", Criticality::Fatal)
                .with_resource(TestResource::boxed("git", false, false, &applied)),
        );

        let mut recorder = Recorder::default();
        let report = execute(plan, &ExecuteOptions::default(), &mut recorder);

        assert!(report.is_success());
        assert_eq!(applied.get(), 2);
        assert!(report.step("flatpak").unwrap().status.is_failure());
        assert_eq!(report.step("packages").unwrap().status, StepStatus::Applied);
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(recorder.started, vec!["flatpak", "packages"]);
        assert_eq!(recorder.completed, vec!["flatpak", "packages"]);
        assert_eq!(recorder.resources, 2);
    }

    #[test]
    fn test_fatal_failure_aborts() {
        let applied = Rc::new(Cell::new(0));
        let mut plan = Plan::new();
        plan.push(
            Step::new("packages", "", Criticality::Fatal)
                .with_resource(TestResource::boxed("git", false, true, &applied)),
        );
        plan.push(
            Step::new("desktop", "", Criticality::Recoverable)
                .with_resource(TestResource::boxed("dark", false, false, &applied)),
        );

        let report = execute(plan, &ExecuteOptions::default(), &mut NoObserver);

        assert!(!report.is_success());
        assert_eq!(report.aborted.as_deref(), Some("packages"));
        assert!(report.step("desktop").is_none());
        // Failed resource is attempted exactly once
        assert_eq!(applied.get(), 1);
    }

    #[test]
    fn test_failure_does_not_stop_remaining_resources_in_step() {
        let applied = Rc::new(Cell::new(0));
        let mut plan = Plan::new();
        plan.push(
            Step::new("debloat", "", Criticality::Recoverable)
                .with_resource(TestResource::boxed("a", false, true, &applied))
                .with_resource(TestResource::boxed("b", false, false, &applied)),
        );

        let report = execute(plan, &ExecuteOptions::default(), &mut NoObserver);
        let step = report.step("debloat").unwrap();
        assert_eq!(applied.get(), 2);
        assert_eq!(step.resource("b").unwrap().result, ApplyResult::Created);
        assert!(matches!(step.status, StepStatus::Failed { ref error } if error.contains("a:")));
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let applied = Rc::new(Cell::new(0));
        let mut plan = Plan::new();
        plan.push(
            Step::new("packages", "", Criticality::Fatal)
                .with_resource(TestResource::boxed("git", false, false, &applied))
                .with_resource(TestResource::boxed("curl", true, false, &applied)),
        );

        let opts = ExecuteOptions {
            dry_run: true,
            verbose: false,
        };
        let report = execute(plan, &opts, &mut NoObserver);

        assert_eq!(applied.get(), 0);
        let step = report.step("packages").unwrap();
        assert!(matches!(step.status, StepStatus::Skipped { .. }));
        assert!(matches!(
            step.resource("git").unwrap().result,
            ApplyResult::Skipped { ref reason } if reason.starts_with("would add")
        ));
        assert_eq!(step.resource("curl").unwrap().result, ApplyResult::NoChange);
    }

    #[test]
    fn test_skip_step_recorded() {
        let mut plan = Plan::new();
        plan.push(Step::skip(
            "desktop",
            "Apply desktop preferences",
            Criticality::Recoverable,
            "no session bus",
        ));

        let report = execute(plan, &ExecuteOptions::default(), &mut NoObserver);
        assert!(report.is_success());
        assert_eq!(
            report.step("desktop").unwrap().status,
            StepStatus::Skipped {
                reason: "no session bus".into()
            }
        );
    }

    #[test]
    fn test_unavailable_step_depends_on_criticality() {
        let mut plan = Plan::new();
        plan.push(Step::unavailable(
            "debloat",
            "",
            Criticality::Recoverable,
            "unsupported distribution",
        ));
        plan.push(Step::unavailable(
            "packages",
            "",
            Criticality::Fatal,
            "unsupported distribution",
        ));
        plan.push(Step::new("desktop", "", Criticality::Recoverable));

        let report = execute(plan, &ExecuteOptions::default(), &mut NoObserver);
        assert!(matches!(
            report.step("debloat").unwrap().status,
            StepStatus::Skipped { .. }
        ));
        assert!(report.step("packages").unwrap().status.is_failure());
        assert_eq!(report.aborted.as_deref(), Some("packages"));
        assert!(report.step("desktop").is_none());
    }
}
