//! Provisioning engine
//!
//! 1. Planning - turn the probed environment and config into ordered steps
//! 2. Executing - handled by the `sequencer` crate
//! 3. Reporting - console progress and the end-of-run summary

pub mod plan;
pub mod report;

pub use plan::{ProvisionContext, STEPS, build_plan, normalize_steps};
pub use report::{ConsoleObserver, print_summary, summary_lines};
