// src/executor/abort.rs

//! Abort protocol
//!
//! On any fatal error every live worker is interrupted; workers that do
//! not exit within the grace period get their whole process group killed.
//! The aborter is idempotent, swallows its own failures, and also runs
//! from `Drop` so that a panic inside the loop cannot orphan a child.

use super::Executor;
use nix::sys::signal::Signal;
use std::time::Duration;
use tracing::{debug, warn};

/// How long an interrupted worker gets to exit before the tree kill.
const ABORT_GRACE: Duration = Duration::from_millis(200);

impl Executor {
    /// Interrupt, then kill, every live worker.
    pub(crate) fn abort_all(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        if self.state.workers.is_empty() {
            return;
        }

        warn!(workers = self.state.workers.len(), "aborting live workers");

        for worker in self.state.workers.values_mut() {
            if worker.process.is_alive() {
                if let Err(e) = worker.process.signal_tree(Signal::SIGINT) {
                    debug!(worker = worker.id, "interrupt failed: {}", e);
                }
            }
        }

        for worker in self.state.workers.values_mut() {
            if worker.process.is_alive() && !worker.process.wait(ABORT_GRACE) {
                debug!(worker = worker.id, "escalating to tree kill");
                worker.process.kill_tree();
            }
        }

        for worker in self.state.workers.values() {
            self.state.rows[worker.row_index()].run.worker_id = None;
        }
        self.state.workers.clear();
        self.scratch.clear();
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // backstop: no orphan child survives an early return or panic
        self.abort_all();
    }
}
