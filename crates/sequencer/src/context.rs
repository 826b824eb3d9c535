//! Apply context and observer traits
//!
//! These traits let the sequencer report progress without depending on a
//! particular terminal UI or log sink.

use crate::types::{ResourceRecord, StepRecord};

/// Observer for run events
///
/// Implement this trait to receive progress updates during execution.
/// The CLI uses one observer for the console and one for the run log file.
pub trait RunObserver {
    /// Called before a step runs
    fn on_step_start(&mut self, index: usize, total: usize, name: &str, description: &str);

    /// Called when a resource inside the current step finishes
    fn on_resource_complete(&mut self, step: &str, record: &ResourceRecord);

    /// Called after a step finishes, was skipped, or failed
    fn on_step_complete(&mut self, record: &StepRecord);
}

/// No-op observer
pub struct NoObserver;

impl RunObserver for NoObserver {
    fn on_step_start(&mut self, _index: usize, _total: usize, _name: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _step: &str, _record: &ResourceRecord) {}
    fn on_step_complete(&mut self, _record: &StepRecord) {}
}

/// Observers can be lent to [`crate::execute`] without giving them up
impl<T: RunObserver + ?Sized> RunObserver for &mut T {
    fn on_step_start(&mut self, index: usize, total: usize, name: &str, description: &str) {
        (**self).on_step_start(index, total, name, description);
    }

    fn on_resource_complete(&mut self, step: &str, record: &ResourceRecord) {
        (**self).on_resource_complete(step, record);
    }

    fn on_step_complete(&mut self, record: &StepRecord) {
        (**self).on_step_complete(record);
    }
}

/// Fan-out to two observers
impl<A: RunObserver, B: RunObserver> RunObserver for (A, B) {
    fn on_step_start(&mut self, index: usize, total: usize, name: &str, description: &str) {
        self.0.on_step_start(index, total, name, description);
        self.1.on_step_start(index, total, name, description);
    }

    fn on_resource_complete(&mut self, step: &str, record: &ResourceRecord) {
        self.0.on_resource_complete(step, record);
        self.1.on_resource_complete(step, record);
    }

    fn on_step_complete(&mut self, record: &StepRecord) {
        self.0.on_step_complete(record);
        self.1.on_step_complete(record);
    }
}

/// Context passed to resource apply operations
#[derive(Debug, Clone, Default)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self { dry_run, verbose }
    }
}
