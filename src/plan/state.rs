// src/plan/state.rs

//! Authoritative in-memory execution state
//!
//! `PlanState` owns the plan rows, the live worker set, and the run
//! configuration. It is created once per execution, mutated only by the
//! scheduler thread, and consumed into an `ExecutionResult` on return.

use crate::error::{Error, Result};
use crate::plan::{validate_plan, PlanRow};
use crate::worker::Worker;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

/// Run configuration: target library and pool size.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Target library directory packages are installed into
    pub lib: PathBuf,
    /// Maximum number of concurrently live workers
    pub num_workers: usize,
}

impl PlanConfig {
    pub fn new(lib: impl Into<PathBuf>, num_workers: usize) -> Self {
        Self {
            lib: lib.into(),
            num_workers,
        }
    }
}

/// The scheduler's single source of truth.
#[derive(Debug)]
pub struct PlanState {
    pub rows: Vec<PlanRow>,
    /// Live workers keyed by id; BTreeMap so the poller sees a stable order
    pub workers: BTreeMap<u64, Worker>,
    pub config: PlanConfig,
}

impl PlanState {
    /// Validate the plan, pre-seed the done flags and residual dependency
    /// sets, and wrap everything up for the executor.
    pub fn new(mut rows: Vec<PlanRow>, config: PlanConfig) -> Result<Self> {
        if config.num_workers < 1 {
            return Err(Error::InvalidPlan(format!(
                "num_workers must be at least 1, got {}",
                config.num_workers
            )));
        }
        validate_plan(&rows)?;

        let installed: BTreeSet<String> = rows
            .iter()
            .filter(|r| r.kind.is_preinstalled())
            .map(|r| r.package.clone())
            .collect();
        for row in &mut rows {
            row.preseed(&installed);
        }

        Ok(Self {
            rows,
            workers: BTreeMap::new(),
            config,
        })
    }

    /// True when every row has completed its install phase.
    pub fn all_installed(&self) -> bool {
        self.rows.iter().all(|r| r.run.install_done)
    }

    /// Number of rows not yet installed.
    pub fn remaining(&self) -> usize {
        self.rows.iter().filter(|r| !r.run.install_done).count()
    }

    /// Number of build/install actions still pending; used to size the
    /// progress bar.
    pub fn pending_actions(&self) -> u64 {
        self.rows
            .iter()
            .map(|r| u64::from(r.needs_build()) + u64::from(r.needs_install()))
            .sum()
    }

    /// Remove `package` from every other row's residual dependency set.
    ///
    /// Called exactly once per row, when that row's install completes; this
    /// is what unblocks downstream builds.
    pub fn release_installed(&mut self, package: &str) {
        for row in &mut self.rows {
            if row.run.deps_left.remove(package) {
                debug!(
                    package = %row.package,
                    installed = %package,
                    left = row.run.deps_left.len(),
                    "dependency satisfied"
                );
            }
        }
    }

    /// Check the structural invariants of the state.
    ///
    /// Compiled to a no-op in release builds; the executor calls this after
    /// every mutation step.
    pub fn debug_assert_invariants(&self) {
        if cfg!(not(debug_assertions)) {
            return;
        }

        assert!(
            self.workers.len() <= self.config.num_workers,
            "worker pool over capacity: {} > {}",
            self.workers.len(),
            self.config.num_workers
        );

        let pending: BTreeSet<&str> = self
            .rows
            .iter()
            .filter(|r| !r.run.install_done)
            .map(|r| r.package.as_str())
            .collect();

        for (idx, row) in self.rows.iter().enumerate() {
            assert!(
                !row.run.install_done || row.run.build_done,
                "'{}' installed without being built",
                row.package
            );
            assert!(
                !row.run.deps_left.contains(&row.package),
                "'{}' depends on itself",
                row.package
            );
            for dep in &row.run.deps_left {
                assert!(
                    pending.contains(dep.as_str()),
                    "'{}' still waits on installed package '{}'",
                    row.package,
                    dep
                );
            }

            let owners = self
                .workers
                .values()
                .filter(|w| w.row_index() == idx)
                .count();
            match row.run.worker_id {
                Some(id) => {
                    assert_eq!(owners, 1, "'{}' owner count != 1", row.package);
                    assert!(
                        self.workers.contains_key(&id),
                        "'{}' references dead worker {}",
                        row.package,
                        id
                    );
                }
                None => assert_eq!(owners, 0, "'{}' has an unregistered worker", row.package),
            }
        }
    }
}
