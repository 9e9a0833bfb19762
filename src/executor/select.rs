// src/executor/select.rs

//! Task selection policy
//!
//! The selector is a pure function of the plan state and the pool capacity.
//! Builds win over installs when both are available: finishing a build's
//! install chain is usually what unblocks the downstream critical path, and
//! a build can only start once every one of its dependencies is installed,
//! so pending builds are the scarcer resource.

use crate::error::{Error, Result};
use crate::plan::state::PlanState;

/// What the scheduler should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Build the source package at this row
    Build { row: usize },
    /// Install the archive at this row
    Install { row: usize },
    /// Nothing is runnable right now
    Idle,
}

/// Pick the next task, in priority order:
///
/// 1. idle when the pool is full;
/// 2. the lowest-indexed row that can build (not built, no residual
///    dependencies, not owned by a worker);
/// 3. the lowest-indexed row that can install (built, not installed, not
///    owned);
/// 4. a deadlock error when packages remain but nothing is runnable and no
///    worker is live;
/// 5. idle otherwise.
pub fn select_next(state: &PlanState) -> Result<Task> {
    if state.workers.len() >= state.config.num_workers {
        return Ok(Task::Idle);
    }

    for (row, r) in state.rows.iter().enumerate() {
        if !r.run.build_done && r.run.deps_left.is_empty() && r.run.worker_id.is_none() {
            return Ok(Task::Build { row });
        }
    }

    for (row, r) in state.rows.iter().enumerate() {
        if r.run.build_done && !r.run.install_done && r.run.worker_id.is_none() {
            return Ok(Task::Install { row });
        }
    }

    if state.workers.is_empty() && !state.all_installed() {
        return Err(Error::DependencyDeadlock {
            remaining: state.remaining(),
        });
    }

    Ok(Task::Idle)
}
