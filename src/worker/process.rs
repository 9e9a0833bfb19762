// src/worker/process.rs

//! Supervised subprocess handle
//!
//! `WorkerProcess` wraps one spawned build or install child. The child runs
//! in its own process group with piped stdout/stderr (switched to
//! non-blocking) and a nullified stdin, so that:
//!
//! - the scheduler can read output incrementally without ever blocking,
//! - a tree kill reaches helpers the child spawned,
//! - the child cannot hang waiting for terminal input.
//!
//! Liveness and exit status go through `try_wait`, caching the status once
//! observed. The terminal drains track EOF per pipe; `has_incomplete_*`
//! stays true until EOF is seen, which covers the race where the child has
//! exited but a grandchild still holds the pipe's write end.

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::Result;

/// Handle over one spawned worker subprocess.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    status: Option<ExitStatus>,
    stdout_eof: bool,
    stderr_eof: bool,
}

impl WorkerProcess {
    /// Spawn `command` as a supervised worker.
    ///
    /// The command's stdio configuration is overridden: stdin is nullified
    /// (prevents hangs on interactive children), stdout/stderr are piped
    /// and made non-blocking, and the child becomes its own process group
    /// leader so `kill_tree` covers its descendants.
    pub fn spawn(mut command: Command) -> std::io::Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;

        set_nonblocking(stdout.as_raw_fd())?;
        set_nonblocking(stderr.as_raw_fd())?;

        debug!(pid = child.id(), "spawned worker process");

        Ok(Self {
            child,
            stdout: Some(stdout),
            stderr: Some(stderr),
            status: None,
            stdout_eof: false,
            stderr_eof: false,
        })
    }

    /// True while the child has not been observed to exit.
    pub fn is_alive(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = self.child.id(), "try_wait failed: {}", e);
                false
            }
        }
    }

    /// Exit code, once the child has exited. Children killed by a signal
    /// report -1.
    pub fn exit_status(&self) -> Option<i32> {
        self.status.map(|s| s.code().unwrap_or(-1))
    }

    /// Non-blocking read of up to `max` bytes currently buffered on stdout.
    pub fn read_output(&mut self, max: usize) -> Result<Vec<u8>> {
        read_some(&mut self.stdout, max, &mut self.stdout_eof)
    }

    /// Non-blocking read of up to `max` bytes currently buffered on stderr.
    pub fn read_error(&mut self, max: usize) -> Result<Vec<u8>> {
        read_some(&mut self.stderr, max, &mut self.stderr_eof)
    }

    /// Terminal drain of stdout: everything still buffered, up to EOF.
    ///
    /// If the read would block before EOF is reached (a writer still holds
    /// the pipe), the pipe is left marked incomplete.
    pub fn read_all_output(&mut self) -> Result<Vec<u8>> {
        drain(&mut self.stdout, &mut self.stdout_eof)
    }

    /// Terminal drain of stderr; see [`read_all_output`](Self::read_all_output).
    pub fn read_all_error(&mut self) -> Result<Vec<u8>> {
        drain(&mut self.stderr, &mut self.stderr_eof)
    }

    /// True while the stdout pipe has not reported EOF.
    pub fn has_incomplete_output(&self) -> bool {
        !self.stdout_eof
    }

    /// True while the stderr pipe has not reported EOF.
    pub fn has_incomplete_error(&self) -> bool {
        !self.stderr_eof
    }

    /// Send `sig` to the child process (not its descendants).
    pub fn signal(&mut self, sig: Signal) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        kill(self.pid(), sig)?;
        Ok(())
    }

    /// Send `sig` to the child's whole process group, so helpers the child
    /// spawned receive it too. An already-gone group is not an error.
    pub fn signal_tree(&mut self, sig: Signal) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        match killpg(self.pid(), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Kill the child's entire process group and reap the child.
    ///
    /// Never fails; an already-gone group is not an error.
    pub fn kill_tree(&mut self) {
        match killpg(self.pid(), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(pid = self.child.id(), "tree kill failed: {}", e),
        }
        match self.child.wait() {
            Ok(status) => self.status = Some(status),
            Err(e) => warn!(pid = self.child.id(), "reap after kill failed: {}", e),
        }
    }

    /// Wait up to `timeout` for the child to exit. Returns true once the
    /// child is known to have exited.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.status.is_some() {
            return true;
        }
        match self.child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                self.status = Some(status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(pid = self.child.id(), "wait failed: {}", e);
                false
            }
        }
    }

    /// Stdout descriptor for readiness polling; None once the pipe hit EOF.
    pub(crate) fn stdout_fd(&self) -> Option<BorrowedFd<'_>> {
        if self.stdout_eof {
            return None;
        }
        self.stdout.as_ref().map(|s| s.as_fd())
    }

    /// Stderr descriptor for readiness polling; None once the pipe hit EOF.
    pub(crate) fn stderr_fd(&self) -> Option<BorrowedFd<'_>> {
        if self.stderr_eof {
            return None;
        }
        self.stderr.as_ref().map(|s| s.as_fd())
    }

    fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }
}

fn set_nonblocking(fd: RawFd) -> std::io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(errno_to_io)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(errno_to_io)?;
    Ok(())
}

fn errno_to_io(errno: Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(errno as i32)
}

/// Read up to `max` bytes without blocking.
fn read_some<R: Read>(pipe: &mut Option<R>, max: usize, eof: &mut bool) -> Result<Vec<u8>> {
    let Some(reader) = pipe.as_mut() else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    while out.len() < max {
        let want = (max - out.len()).min(buf.len());
        match reader.read(&mut buf[..want]) {
            Ok(0) => {
                *eof = true;
                break;
            }
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}

/// Drain until EOF, or until the read would block because a writer still
/// holds the pipe open.
fn drain<R: Read>(pipe: &mut Option<R>, eof: &mut bool) -> Result<Vec<u8>> {
    let Some(reader) = pipe.as_mut() else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                *eof = true;
                break;
            }
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn wait_for_exit(proc: &mut WorkerProcess) {
        for _ in 0..500 {
            if !proc.is_alive() {
                return;
            }
            sleep(Duration::from_millis(10));
        }
        panic!("worker did not exit in time");
    }

    #[test]
    fn test_spawn_captures_both_streams() {
        let mut proc = WorkerProcess::spawn(sh("printf out; printf err >&2")).unwrap();
        wait_for_exit(&mut proc);

        let out = proc.read_all_output().unwrap();
        let err = proc.read_all_error().unwrap();
        assert_eq!(out, b"out");
        assert_eq!(err, b"err");
        assert!(!proc.has_incomplete_output());
        assert!(!proc.has_incomplete_error());
        assert_eq!(proc.exit_status(), Some(0));
    }

    #[test]
    fn test_nonzero_exit_status() {
        let mut proc = WorkerProcess::spawn(sh("exit 3")).unwrap();
        assert!(proc.wait(Duration::from_secs(5)));
        assert_eq!(proc.exit_status(), Some(3));
    }

    #[test]
    fn test_exit_status_unavailable_while_running() {
        let mut proc = WorkerProcess::spawn(sh("sleep 10")).unwrap();
        assert!(proc.is_alive());
        assert_eq!(proc.exit_status(), None);
        proc.kill_tree();
        assert!(!proc.is_alive());
    }

    #[test]
    fn test_nonblocking_read_while_running() {
        let mut proc = WorkerProcess::spawn(sh("printf hello; sleep 10")).unwrap();

        let mut got = Vec::new();
        for _ in 0..500 {
            got.extend(proc.read_output(10_000).unwrap());
            if !got.is_empty() {
                break;
            }
            sleep(Duration::from_millis(10));
        }
        assert_eq!(got, b"hello");
        assert!(proc.is_alive());
        assert!(proc.has_incomplete_output());

        proc.kill_tree();
    }

    #[test]
    fn test_kill_tree_reaches_descendants() {
        // the child spawns a grandchild that would outlive a plain kill
        let mut proc = WorkerProcess::spawn(sh("sleep 30 & wait")).unwrap();
        assert!(proc.is_alive());
        proc.kill_tree();
        assert!(!proc.is_alive());
        assert_eq!(proc.exit_status(), Some(-1));
    }

    #[test]
    fn test_wait_times_out_on_running_child() {
        let mut proc = WorkerProcess::spawn(sh("sleep 10")).unwrap();
        assert!(!proc.wait(Duration::from_millis(50)));
        proc.kill_tree();
        assert!(proc.wait(Duration::from_millis(50)));
    }

    #[test]
    fn test_signal_interrupts_child() {
        // exec so the signal reaches the sleeping process itself, not a
        // shell that would defer it until the child exits
        let mut proc = WorkerProcess::spawn(sh("exec sleep 10")).unwrap();
        proc.signal(Signal::SIGINT).unwrap();
        assert!(proc.wait(Duration::from_secs(5)));
        // killed by signal: no exit code
        assert_eq!(proc.exit_status(), Some(-1));
    }
}
