//! Remote code execution.
//!
//! `ExecutionCoordinator` submits editor content to the execution service
//! and drives the run state machine:
//!
//! ```text
//! idle ──▶ running ──▶ succeeded
//!            ▲    └──▶ failed
//!            └── any new submit
//! ```

mod coordinator;
mod state;

pub use coordinator::ExecutionCoordinator;
pub use state::{RunReport, RunSnapshot, RunState, is_valid_transition};

/// Output shown when a run produced neither stdout nor stderr.
pub const NO_OUTPUT: &str = "[No output received]";

/// Detail shown when the runner flags an error without any text.
pub const UNKNOWN_EXECUTION_ERROR: &str = "Unknown execution error";
