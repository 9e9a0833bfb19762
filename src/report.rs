// src/report.rs

//! Execution results and the user-visible summary

use crate::error::{Error, Result};
use crate::plan::{LibStatus, PlanRow};
use std::fmt;
use std::time::Duration;

/// Outcome of one plan execution.
///
/// The rows carry their execution fields (done flags, timings, captured
/// output) regardless of how the run ended, so a failed run can still be
/// examined. `error` is the fatal error that stopped the run, if any; the
/// abort protocol has already run by the time this value exists.
#[derive(Debug)]
pub struct ExecutionResult {
    pub rows: Vec<PlanRow>,
    pub error: Option<Error>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Rows whose build or install failed.
    pub fn failures(&self) -> Vec<&PlanRow> {
        self.rows
            .iter()
            .filter(|r| r.run.build_error || r.run.install_error)
            .collect()
    }

    /// Surface the fatal error, discarding the per-row detail.
    pub fn into_result(self) -> Result<Vec<PlanRow>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.rows),
        }
    }

    /// Aggregate counts and times for display.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for row in &self.rows {
            match row.lib_status {
                LibStatus::New => summary.installed += 1,
                LibStatus::Update => summary.updated += 1,
                LibStatus::NoUpdate => summary.not_updated += 1,
                LibStatus::Current => summary.current += 1,
            }
            if let Some(d) = row.run.build_time.elapsed() {
                summary.build_time += d;
            }
            if let Some(d) = row.run.install_time.elapsed() {
                summary.install_time += d;
            }
        }
        summary
    }
}

/// User-visible summary printed after a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub installed: usize,
    pub updated: usize,
    pub not_updated: usize,
    pub current: usize,
    /// Cumulative wall-clock time spent in build workers
    pub build_time: Duration,
    /// Cumulative wall-clock time spent in install workers
    pub install_time: Duration,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Installed:    {}", self.installed)?;
        writeln!(f, "Updated:      {}", self.updated)?;
        writeln!(f, "Not updated:  {}", self.not_updated)?;
        writeln!(f, "Current:      {}", self.current)?;
        writeln!(f, "Build time:   {}", format_duration(self.build_time))?;
        write!(f, "Install time: {}", format_duration(self.install_time))
    }
}

/// Human-readable duration: "850ms", "3.4s", "2m 14s", "1h 4m".
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Compilation, PackageType, RowExecution, Timing};
    use std::path::PathBuf;

    fn row(package: &str, lib_status: LibStatus) -> PlanRow {
        PlanRow {
            package: package.to_string(),
            version: "1.0.0".to_string(),
            kind: PackageType::Cran,
            binary: false,
            file: PathBuf::from("f.tar.gz"),
            sources: Vec::new(),
            dependencies: Default::default(),
            vignettes: false,
            needs_compilation: Compilation::Unknown,
            metadata: Default::default(),
            lib_status,
            run: RowExecution::default(),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(3400)), "3.4s");
        assert_eq!(format_duration(Duration::from_secs(134)), "2m 14s");
        assert_eq!(format_duration(Duration::from_secs(3840)), "1h 4m");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }

    #[test]
    fn test_summary_counts_by_lib_status() {
        let mut a = row("a", LibStatus::New);
        a.run.build_time = Timing::Elapsed(Duration::from_secs(2));
        a.run.install_time = Timing::Elapsed(Duration::from_secs(1));
        let mut b = row("b", LibStatus::Update);
        b.run.install_time = Timing::Elapsed(Duration::from_secs(3));

        let result = ExecutionResult {
            rows: vec![
                a,
                b,
                row("c", LibStatus::NoUpdate),
                row("d", LibStatus::Current),
            ],
            error: None,
        };
        let summary = result.summary();
        assert_eq!(summary.installed, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.not_updated, 1);
        assert_eq!(summary.current, 1);
        assert_eq!(summary.build_time, Duration::from_secs(2));
        assert_eq!(summary.install_time, Duration::from_secs(4));
    }

    #[test]
    fn test_summary_display() {
        let result = ExecutionResult {
            rows: vec![row("a", LibStatus::New)],
            error: None,
        };
        let text = result.summary().to_string();
        assert!(text.contains("Installed:    1"));
        assert!(text.contains("Build time:   0ms"));
    }

    #[test]
    fn test_failures_filters_rows() {
        let mut a = row("a", LibStatus::New);
        a.run.build_error = true;
        let result = ExecutionResult {
            rows: vec![a, row("b", LibStatus::New)],
            error: Some(Error::BuildFailed {
                package: "a".to_string(),
                code: 1,
            }),
        };
        assert!(!result.is_success());
        let failures = result.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].package, "a");
    }

    #[test]
    fn test_into_result_surfaces_the_error() {
        let ok = ExecutionResult {
            rows: Vec::new(),
            error: None,
        };
        assert!(ok.into_result().is_ok());

        let failed = ExecutionResult {
            rows: Vec::new(),
            error: Some(Error::DependencyDeadlock { remaining: 1 }),
        };
        assert!(matches!(
            failed.into_result(),
            Err(Error::DependencyDeadlock { .. })
        ));
    }
}
