// src/worker/mod.rs

//! Workers: in-flight subprocesses plus their captured output

mod poll;
mod process;

pub use poll::poll_workers;
pub use process::WorkerProcess;

use crate::executor::Task;
use std::path::{Path, PathBuf};

/// One in-flight worker: the subprocess, the task it is running, and the
/// raw bytes captured from it so far.
#[derive(Debug)]
pub struct Worker {
    pub id: u64,
    pub task: Task,
    pub process: WorkerProcess,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Where a build worker is expected to leave its archive
    pub artifact: Option<PathBuf>,
}

impl Worker {
    /// Plan row this worker acts on.
    pub fn row_index(&self) -> usize {
        match self.task {
            Task::Build { row } | Task::Install { row } => row,
            Task::Idle => unreachable!("idle tasks never own a worker"),
        }
    }

    /// Completion artifact accessor: the built archive, once it exists on
    /// disk. Only meaningful for build workers after a successful exit.
    pub fn built_file(&self) -> Option<&Path> {
        self.artifact.as_deref().filter(|p| p.is_file())
    }
}

/// Split a captured byte stream into lines.
///
/// Line terminators are normalized (`\r\n` folds into `\n`) and removed. A
/// trailing partial line is retained as the final element; a trailing
/// newline does not produce an empty element.
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let text = String::from_utf8_lossy(bytes).replace("\r\n", "\n");
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_empty() {
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_split_lines_trailing_newline() {
        assert_eq!(split_lines(b"a\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_split_lines_trailing_partial() {
        assert_eq!(split_lines(b"a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines(b"partial"), vec!["partial"]);
    }

    #[test]
    fn test_split_lines_normalizes_crlf() {
        assert_eq!(split_lines(b"a\r\nb\r\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_split_lines_keeps_interior_blanks() {
        assert_eq!(split_lines(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_split_lines_round_trips_with_join() {
        // joining with '\n' restores the input up to trailing-newline
        // normalization
        for input in ["a\nb\nc\n", "a\nb\nc", "one\n", "one"] {
            let lines = split_lines(input.as_bytes());
            let joined = lines.join("\n");
            assert_eq!(joined, input.trim_end_matches('\n'));
        }
    }
}
