//! # Sequencer
//!
//! Ordered, idempotent provisioning steps.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging a host to it one named step at a
//! time.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (a package, a
//!   setting, a config file line)
//! - **Step**: A named, ordered group of resources with a [`Criticality`]
//! - **Plan**: The fixed ordered list of steps for one run
//! - **Executor**: Runs the plan, never retries, aborts only on fatal steps
//! - **RunReport**: Every step and resource outcome, for the final summary
//!
//! ## Example
//!
//! ```ignore
//! use sequencer::{
//!     ApplyContext, ApplyResult, Criticality, ExecuteOptions, NoObserver, Plan,
//!     Resource, ResourceState, Step, execute,
//! };
//!
//! #[derive(Debug)]
//! struct Marker { path: String }
//!
//! impl Resource for Marker {
//!     fn id(&self) -> String { self.path.clone() }
//!     fn description(&self) -> String { format!("Create {}", self.path) }
//!     fn resource_type(&self) -> &'static str { "file" }
//!
//!     fn current_state(&self) -> anyhow::Result<ResourceState> {
//!         if std::path::Path::new(&self.path).exists() {
//!             Ok(ResourceState::Present { details: None })
//!         } else {
//!             Ok(ResourceState::Absent)
//!         }
//!     }
//!
//!     fn desired_state(&self) -> ResourceState {
//!         ResourceState::Present { details: None }
//!     }
//!
//!     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
//!         std::fs::write(&self.path, "")?;
//!         Ok(ApplyResult::Created)
//!     }
//! }
//!
//! let mut plan = Plan::new();
//! plan.push(
//!     Step::new("marker", "Create marker file", Criticality::Recoverable)
//!         .with_resource(Box::new(Marker { path: "/tmp/marker".into() })),
//! );
//!
//! let report = execute(plan, &ExecuteOptions::default(), &mut NoObserver);
//! assert!(report.is_success());
//! ```
//!
//! ## Command execution
//!
//! Resources shell out through the [`CommandRunner`] trait. [`SystemRunner`]
//! runs real processes and knows how to elevate (`sudo`) and how to run as
//! another user with a given environment (`runuser` / `sudo -u`).
//! [`ScriptedRunner`] records calls and returns canned output, which keeps
//! every resource testable without touching the host.

pub mod context;
pub mod diff;
pub mod exec;
pub mod executor;
pub mod plan;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoObserver, RunObserver};
pub use diff::ResourceDiff;
pub use exec::{
    CommandOutput, CommandRunner, CommandSpec, Invocation, RunAs, ScriptedRunner, SystemRunner,
};
pub use executor::execute;
pub use plan::{Plan, Step, StepBody};
pub use resource::{BoxedResource, Resource};
pub use types::{
    ApplyResult, Criticality, ExecuteOptions, ExecuteSummary, ResourceRecord, ResourceState,
    RunReport, StepRecord, StepStatus,
};
