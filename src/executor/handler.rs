// src/executor/handler.rs

//! Per-worker event handling and phase completion
//!
//! A ready event does not imply termination. The drain protocol is
//! two-phase: while the child is alive, output is captured incrementally
//! with a bounded non-blocking read; once it has exited, the terminal
//! drain runs, and only when both pipes have reported EOF does the worker
//! count as finished and its row complete.

use super::{Executor, Task};
use crate::alert::AlertLevel;
use crate::error::{Error, Result};
use crate::report::format_duration;
use crate::worker::{split_lines, Worker};
use std::path::Path;
use tracing::debug;

/// Cap for one incremental read per stream per ready event.
const READ_CHUNK: usize = 10_000;

impl Executor {
    /// React to a ready worker: capture output, and complete the row if
    /// the worker is finished.
    pub(super) fn handle_ready(&mut self, id: u64) -> Result<()> {
        let Some(worker) = self.state.workers.get_mut(&id) else {
            return Ok(());
        };

        if worker.process.is_alive() {
            let chunk = worker.process.read_output(READ_CHUNK)?;
            worker.stdout.extend_from_slice(&chunk);
            let chunk = worker.process.read_error(READ_CHUNK)?;
            worker.stderr.extend_from_slice(&chunk);
            return Ok(());
        }

        let rest = worker.process.read_all_output()?;
        worker.stdout.extend_from_slice(&rest);
        let rest = worker.process.read_all_error()?;
        worker.stderr.extend_from_slice(&rest);

        if worker.process.is_alive()
            || worker.process.has_incomplete_output()
            || worker.process.has_incomplete_error()
        {
            // exit observed before the pipes closed (or vice versa);
            // another ready event will follow
            debug!(worker = id, "worker exited but pipes are still open");
            return Ok(());
        }

        if let Some(worker) = self.state.workers.remove(&id) {
            self.finish_worker(worker)?;
        }
        Ok(())
    }

    /// Complete a finished worker's row and refill the freed slot.
    fn finish_worker(&mut self, worker: Worker) -> Result<()> {
        match worker.task {
            Task::Build { row } => self.complete_build(row, worker)?,
            Task::Install { row } => self.complete_install(row, worker)?,
            Task::Idle => unreachable!("idle tasks never own a worker"),
        }
        self.spawn_next()?;
        Ok(())
    }

    fn complete_build(&mut self, row: usize, worker: Worker) -> Result<()> {
        let code = worker.process.exit_status().unwrap_or(-1);
        let (package, version, elapsed) = {
            let r = &mut self.state.rows[row];
            r.run.build_stdout = split_lines(&worker.stdout);
            r.run.build_stderr = split_lines(&worker.stderr);
            r.run.worker_id = None;
            // set even on failure, so the row is never retried
            r.run.build_done = true;
            let elapsed = r.run.build_time.finish();
            (r.package.clone(), r.version.clone(), elapsed)
        };

        if code != 0 {
            self.state.rows[row].run.build_error = true;
            self.alerts.alert(
                AlertLevel::Danger,
                &format!("Failed to build {} {}", package, version),
            );
            return Err(Error::BuildFailed { package, code });
        }

        let Some(artifact) = worker.built_file().map(Path::to_path_buf) else {
            return Err(Error::MissingArtifact {
                package,
                path: worker.artifact.unwrap_or_default(),
            });
        };
        self.state.rows[row].file = artifact;

        self.alerts.alert(
            AlertLevel::Success,
            &format!("Built {} {} ({})", package, version, format_duration(elapsed)),
        );
        self.progress.increment(1);
        self.state.debug_assert_invariants();
        Ok(())
    }

    fn complete_install(&mut self, row: usize, worker: Worker) -> Result<()> {
        let code = worker.process.exit_status().unwrap_or(-1);
        let (package, version, elapsed, note) = {
            let r = &mut self.state.rows[row];
            r.run.install_stdout = split_lines(&worker.stdout);
            r.run.install_stderr = split_lines(&worker.stderr);
            r.run.worker_id = None;
            r.run.install_done = true;
            let elapsed = r.run.install_time.finish();
            (r.package.clone(), r.version.clone(), elapsed, r.install_note())
        };

        if code != 0 {
            self.state.rows[row].run.install_error = true;
            self.alerts.alert(
                AlertLevel::Danger,
                &format!("Failed to install {} {}", package, version),
            );
            return Err(Error::InstallFailed { package, code });
        }

        // this is what unblocks downstream builds
        self.state.release_installed(&package);
        // the artifact now lives under lib; the build scratch dir can go
        self.scratch.remove(&row);

        let mut message = format!(
            "Installed {} {} ({})",
            package,
            version,
            format_duration(elapsed)
        );
        if !note.is_empty() {
            message.push(' ');
            message.push_str(&note);
        }
        self.alerts.alert(AlertLevel::Success, &message);
        self.progress.increment(1);
        self.state.debug_assert_invariants();
        Ok(())
    }
}
