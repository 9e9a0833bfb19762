// tests/common/mod.rs

//! Shared test utilities and helpers for executor integration tests.
//!
//! Workers in these tests are real `sh` subprocesses wired through the
//! shell runners. Each scenario gets an arena: a scratch directory with a
//! target library and an append-only event log the worker scripts write
//! to, which ordering assertions read back.

use packrun::{
    Compilation, Executor, LibStatus, PackageType, PlanConfig, PlanRow, RowExecution,
    ShellBuildRunner, ShellInstallRunner,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch area for one executor run.
///
/// Keep the TempDir alive for the duration of the test.
pub struct Arena {
    pub dir: TempDir,
    pub lib: PathBuf,
    pub log: PathBuf,
}

pub fn arena() -> Arena {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib");
    std::fs::create_dir_all(&lib).unwrap();
    let log = dir.path().join("events.log");
    Arena { dir, lib, log }
}

impl Arena {
    /// Build command: log the event, then create the expected artifact.
    pub fn build_ok(&self) -> String {
        format!(
            "echo \"build:$PACKRUN_PACKAGE\" >> \"{}\" && touch \"$PACKRUN_ARTIFACT\"",
            self.log.display()
        )
    }

    /// Build command that logs start/end around a sleep, so concurrency
    /// can be measured from the log.
    pub fn build_slow(&self, seconds: &str) -> String {
        format!(
            "echo \"start:$PACKRUN_PACKAGE\" >> \"{log}\" && sleep {seconds} && \
             echo \"end:$PACKRUN_PACKAGE\" >> \"{log}\" && touch \"$PACKRUN_ARTIFACT\"",
            log = self.log.display(),
            seconds = seconds
        )
    }

    /// Build command that fails after logging.
    pub fn build_fail(&self) -> String {
        format!(
            "echo \"build:$PACKRUN_PACKAGE\" >> \"{}\"; exit 1",
            self.log.display()
        )
    }

    /// Build command that fails fast for `failing` and runs a slow,
    /// marker-writing build for every other package.
    pub fn build_fail_or_slow(&self, failing: &str, seconds: &str) -> String {
        format!(
            "if [ \"$PACKRUN_PACKAGE\" = \"{failing}\" ]; then \
                 echo \"build:$PACKRUN_PACKAGE\" >> \"{log}\"; exit 1; \
             else \
                 echo \"start:$PACKRUN_PACKAGE\" >> \"{log}\"; sleep {seconds}; \
                 echo \"end:$PACKRUN_PACKAGE\" >> \"{log}\"; touch \"$PACKRUN_ARTIFACT\"; \
             fi",
            failing = failing,
            log = self.log.display(),
            seconds = seconds
        )
    }

    /// Install command: log the event.
    pub fn install_ok(&self) -> String {
        format!(
            "echo \"install:$PACKRUN_PACKAGE\" >> \"{}\"",
            self.log.display()
        )
    }

    /// Events logged so far, in write order.
    pub fn events(&self) -> Vec<String> {
        match std::fs::read_to_string(&self.log) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Position of `event` in the log; panics when absent.
    pub fn position(&self, event: &str) -> usize {
        let events = self.events();
        events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event '{}' not in log: {:?}", event, events))
    }

    /// Executor wired to this arena's library and the given commands.
    pub fn executor(
        &self,
        rows: Vec<PlanRow>,
        workers: usize,
        build_cmd: &str,
        install_cmd: &str,
    ) -> Executor {
        Executor::new(rows, PlanConfig::new(&self.lib, workers))
            .unwrap()
            .with_build_runner(Box::new(ShellBuildRunner::new(build_cmd)))
            .with_install_runner(Box::new(ShellInstallRunner::new(install_cmd)))
    }
}

/// A source package row: needs a build, then an install.
pub fn source_row(package: &str, deps: &[&str]) -> PlanRow {
    plan_row(package, PackageType::Standard, false, deps)
}

/// A binary package row: pre-seeded as built, needs an install.
pub fn binary_row(package: &str, deps: &[&str]) -> PlanRow {
    plan_row(package, PackageType::Standard, true, deps)
}

/// A row that is already installed; the executor must not touch it.
pub fn installed_row(package: &str) -> PlanRow {
    plan_row(package, PackageType::Installed, true, &[])
}

pub fn plan_row(package: &str, kind: PackageType, binary: bool, deps: &[&str]) -> PlanRow {
    PlanRow {
        package: package.to_string(),
        version: "1.0.0".to_string(),
        kind,
        binary,
        file: PathBuf::from(format!("src/{}.tar.gz", package)),
        sources: Vec::new(),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        vignettes: false,
        needs_compilation: Compilation::Unknown,
        metadata: Default::default(),
        lib_status: LibStatus::New,
        run: RowExecution::default(),
    }
}
