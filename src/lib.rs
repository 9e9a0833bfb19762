// src/lib.rs

//! Packrun Plan Executor
//!
//! Drives a dependency-ordered plan of package build and install actions to
//! completion with a bounded pool of worker subprocesses.
//!
//! # Architecture
//!
//! - Plan-first: an external resolver hands over an immutable table of rows;
//!   the executor owns only the execution fields
//! - Single-threaded scheduler: all state mutation happens on one thread,
//!   all concurrency lives in subprocesses
//! - Two-phase drain: worker output is captured incrementally while a child
//!   runs and drained terminally once it exits
//! - No orphans: every fatal error runs the abort protocol (interrupt,
//!   grace wait, tree kill) before surfacing

pub mod alert;
mod error;
pub mod executor;
pub mod plan;
pub mod progress;
pub mod report;
pub mod runner;
pub mod worker;

pub use alert::{AlertLevel, AlertSink, CliAlerts, LogAlerts};
pub use error::{Error, Result};
pub use executor::{select_next, Executor, Task};
pub use plan::state::{PlanConfig, PlanState};
pub use plan::{
    default_library, validate_plan, Compilation, LibStatus, PackageType, PlanRow, RowExecution,
    Timing,
};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use report::{format_duration, ExecutionResult, Summary};
pub use runner::{
    BuildRequest, BuildRunner, InstallRequest, InstallRunner, ShellBuildRunner, ShellInstallRunner,
    SpawnedBuild,
};
pub use worker::{poll_workers, split_lines, Worker, WorkerProcess};
