// src/error.rs

//! Error types for plan execution

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while executing an installation plan.
///
/// Everything except `InvalidPlan` is fatal: the executor runs the abort
/// protocol (interrupt, grace wait, tree kill) before surfacing it.
/// `InvalidPlan` is raised before any worker is spawned.
#[derive(Error, Debug)]
pub enum Error {
    /// The plan failed validation before execution started
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A build or install subprocess could not be started
    #[error("failed to start {phase} process for '{package}': {source}")]
    Spawn {
        package: String,
        phase: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A build worker exited with a non-zero status
    #[error("failed to build package '{package}' (exit code {code})")]
    BuildFailed { package: String, code: i32 },

    /// An install worker exited with a non-zero status
    #[error("failed to install package '{package}' (exit code {code})")]
    InstallFailed { package: String, code: i32 },

    /// A build reported success but its archive is not on disk
    #[error("built archive for '{package}' not found at {}", path.display())]
    MissingArtifact { package: String, path: PathBuf },

    /// No task is runnable, no worker is live, yet packages remain
    #[error(
        "dependency deadlock: {remaining} package(s) cannot be scheduled \
         (unsatisfiable dependencies in the plan)"
    )]
    DependencyDeadlock { remaining: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call failure (polling, signalling)
    #[error("system call failed: {0}")]
    Sys(#[from] nix::errno::Errno),
}

impl Error {
    /// Package name carried by per-package failures, if any.
    pub fn package(&self) -> Option<&str> {
        match self {
            Error::Spawn { package, .. }
            | Error::BuildFailed { package, .. }
            | Error::InstallFailed { package, .. }
            | Error::MissingArtifact { package, .. } => Some(package),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_package() {
        let err = Error::BuildFailed {
            package: "curl".to_string(),
            code: 2,
        };
        assert!(err.to_string().contains("curl"));
        assert!(err.to_string().contains('2'));
        assert_eq!(err.package(), Some("curl"));
    }

    #[test]
    fn test_deadlock_message_counts_remaining() {
        let err = Error::DependencyDeadlock { remaining: 3 };
        assert!(err.to_string().contains('3'));
        assert_eq!(err.package(), None);
    }
}
