// src/executor/mod.rs

//! The scheduler loop
//!
//! `Executor` drives a plan to completion: it warm-starts one worker per
//! free slot, then loops (poll the pool, drain ready workers, complete
//! finished rows, refill slots) until every row is installed or a fatal
//! error aborts the run.
//!
//! # Concurrency model
//!
//! Single-threaded cooperative orchestration. The plan state is owned and
//! mutated by this loop only; all concurrency lives in the worker
//! subprocesses. The one suspension point is the poll call.

mod abort;
mod handler;
mod select;

pub use select::{select_next, Task};

use crate::alert::{AlertSink, LogAlerts};
use crate::error::Result;
use crate::plan::state::{PlanConfig, PlanState};
use crate::plan::{PlanRow, Timing};
use crate::progress::{ProgressTracker, SilentProgress};
use crate::report::ExecutionResult;
use crate::runner::{
    BuildRequest, BuildRunner, InstallRequest, InstallRunner, ShellBuildRunner, ShellInstallRunner,
};
use crate::worker::{poll_workers, Worker};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// Poll timeout: long enough not to busy-spin, short enough that progress
/// refresh stays responsive while all workers are quiet.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Executes one installation plan with a bounded worker pool.
pub struct Executor {
    state: PlanState,
    build_runner: Box<dyn BuildRunner>,
    install_runner: Box<dyn InstallRunner>,
    progress: Box<dyn ProgressTracker>,
    alerts: Box<dyn AlertSink>,
    /// Owned by this instance so concurrent executors never collide
    next_worker_id: AtomicU64,
    /// Per-row build scratch directories; released once the row's install
    /// has moved the artifact into the library
    scratch: HashMap<usize, TempDir>,
    last_status: String,
    aborted: bool,
}

impl Executor {
    /// Validate the plan and set up an executor with the default
    /// collaborators (shell runners, silent progress, log alerts).
    pub fn new(rows: Vec<PlanRow>, config: PlanConfig) -> Result<Self> {
        let state = PlanState::new(rows, config)?;
        let total = state.pending_actions();
        Ok(Self {
            state,
            build_runner: Box::new(ShellBuildRunner::default()),
            install_runner: Box::new(ShellInstallRunner::default()),
            progress: Box::new(SilentProgress::with_length(total)),
            alerts: Box::new(LogAlerts),
            next_worker_id: AtomicU64::new(0),
            scratch: HashMap::new(),
            last_status: String::new(),
            aborted: false,
        })
    }

    /// Replace the build collaborator.
    pub fn with_build_runner(mut self, runner: Box<dyn BuildRunner>) -> Self {
        self.build_runner = runner;
        self
    }

    /// Replace the install collaborator.
    pub fn with_install_runner(mut self, runner: Box<dyn InstallRunner>) -> Self {
        self.install_runner = runner;
        self
    }

    /// Replace the progress reporter.
    pub fn with_progress(mut self, progress: Box<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the alert sink.
    pub fn with_alerts(mut self, alerts: Box<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Number of build/install actions the plan still needs; the natural
    /// length for a progress bar.
    pub fn pending_actions(&self) -> u64 {
        self.state.pending_actions()
    }

    /// Drive the plan to completion.
    ///
    /// Always returns the rows with their execution fields, so captured
    /// output and timings stay available for post-mortem even when the run
    /// failed. On any fatal error the abort protocol has already run: no
    /// worker survives this call.
    pub fn execute(mut self) -> ExecutionResult {
        let outcome = self.run();
        let error = match outcome {
            Ok(()) => {
                self.progress.finish_with_message("done");
                None
            }
            Err(e) => {
                self.abort_all();
                self.progress.finish_with_error(&e.to_string());
                Some(e)
            }
        };
        ExecutionResult {
            rows: std::mem::take(&mut self.state.rows),
            error,
        }
    }

    fn run(&mut self) -> Result<()> {
        info!(
            rows = self.state.rows.len(),
            actions = self.state.pending_actions(),
            workers = self.state.config.num_workers,
            "executing installation plan"
        );

        // warm start: one task per free slot
        for _ in 0..self.state.config.num_workers {
            if !self.spawn_next()? {
                break;
            }
        }

        loop {
            if self.state.all_installed() {
                info!("all packages installed");
                return Ok(());
            }

            self.refresh_status();

            let ready = poll_workers(&mut self.state.workers, POLL_TIMEOUT)?;
            for id in ready {
                self.handle_ready(id)?;
            }

            self.spawn_next()?;
        }
    }

    /// Select one task and, unless idle, start a worker for it. Returns
    /// whether a worker was started.
    fn spawn_next(&mut self) -> Result<bool> {
        match select_next(&self.state)? {
            Task::Idle => Ok(false),
            Task::Build { row } => {
                self.start_build(row)?;
                Ok(true)
            }
            Task::Install { row } => {
                self.start_install(row)?;
                Ok(true)
            }
        }
    }

    fn start_build(&mut self, row: usize) -> Result<()> {
        let id = self.next_id();
        let tmp = tempfile::Builder::new()
            .prefix("packrun-build-")
            .tempdir()?;

        let spawned = {
            let r = &self.state.rows[row];
            let req = BuildRequest {
                package: &r.package,
                version: &r.version,
                path: &r.file,
                tmp_dir: tmp.path(),
                lib: &self.state.config.lib,
                vignettes: r.vignettes,
                needs_compilation: r.needs_compilation,
            };
            self.build_runner.start_build(&req)?
        };

        let r = &mut self.state.rows[row];
        r.run.worker_id = Some(id);
        r.run.build_time = Timing::start();
        info!(package = %r.package, worker = id, "building");

        self.scratch.insert(row, tmp);
        self.state.workers.insert(
            id,
            Worker {
                id,
                task: Task::Build { row },
                process: spawned.process,
                stdout: Vec::new(),
                stderr: Vec::new(),
                artifact: Some(spawned.artifact),
            },
        );
        self.state.debug_assert_invariants();
        Ok(())
    }

    fn start_install(&mut self, row: usize) -> Result<()> {
        let id = self.next_id();

        let process = {
            let r = &self.state.rows[row];
            let req = InstallRequest {
                package: &r.package,
                version: &r.version,
                archive: &r.file,
                lib: &self.state.config.lib,
                metadata: &r.metadata,
            };
            self.install_runner.start_install(&req)?
        };

        let r = &mut self.state.rows[row];
        r.run.worker_id = Some(id);
        r.run.install_time = Timing::start();
        info!(package = %r.package, worker = id, "installing");

        self.state.workers.insert(
            id,
            Worker {
                id,
                task: Task::Install { row },
                process,
                stdout: Vec::new(),
                stderr: Vec::new(),
                artifact: None,
            },
        );
        self.state.debug_assert_invariants();
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_worker_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Update the progress status line when the active set changes.
    fn refresh_status(&mut self) {
        let mut active: Vec<String> = Vec::with_capacity(self.state.workers.len());
        for worker in self.state.workers.values() {
            let verb = match worker.task {
                Task::Build { .. } => "building",
                Task::Install { .. } => "installing",
                Task::Idle => continue,
            };
            let package = &self.state.rows[worker.row_index()].package;
            active.push(format!("{} {}", verb, package));
        }
        let message = if active.is_empty() {
            "waiting".to_string()
        } else {
            active.join(", ")
        };
        if message != self.last_status {
            debug!("{}", message);
            self.progress.set_message(&message);
            self.last_status = message;
        }
    }
}
