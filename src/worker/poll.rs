// src/worker/poll.rs

//! Readiness polling over the live worker set
//!
//! One `poll(2)` call multiplexes every worker's stdout/stderr pipe. A
//! worker is *ready* when any of its pipes is readable (or hung up), or
//! when its child has exited. In the common case exit closes the pipes, so
//! POLLHUP wakes the poll immediately; a worker that exited while a
//! grandchild still holds a pipe's write end is re-examined at the poll
//! cadence instead.

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Result;
use crate::worker::Worker;

/// Wait up to `timeout` for any worker to become ready.
///
/// Returns the ids of the ready workers, in ascending id order. Must not
/// be called with an empty worker set by the scheduler loop; an empty set
/// short-circuits to no readiness without sleeping.
pub fn poll_workers(workers: &mut BTreeMap<u64, Worker>, timeout: Duration) -> Result<Vec<u64>> {
    if workers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<u64> = workers.keys().copied().collect();
    let mut ready: Vec<bool> = workers
        .values_mut()
        .map(|w| !w.process.is_alive())
        .collect();
    let any_exited = ready.iter().any(|&r| r);

    // every pipe that has not yet reported EOF takes part in the poll
    let mut owner: Vec<usize> = Vec::new();
    let mut fds: Vec<PollFd> = Vec::new();
    for (idx, worker) in workers.values().enumerate() {
        if let Some(fd) = worker.process.stdout_fd() {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
            owner.push(idx);
        }
        if let Some(fd) = worker.process.stderr_fd() {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
            owner.push(idx);
        }
    }

    if fds.is_empty() {
        // all pipes are at EOF; nothing to select on, but keep the loop
        // from spinning while the children finish up
        if !any_exited {
            std::thread::sleep(timeout);
        }
    } else {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(n) if n > 0 => {
                for (slot, fd) in fds.iter().enumerate() {
                    if fd.revents().is_some_and(|r| !r.is_empty()) {
                        ready[owner[slot]] = true;
                    }
                }
            }
            Ok(_) => {}
            // interrupted polls surface as an empty readiness set
            Err(Errno::EINTR) => {}
            Err(e) => return Err(e.into()),
        }
    }
    drop(fds);

    // pick up children that exited while we were waiting
    for (idx, worker) in workers.values_mut().enumerate() {
        if !worker.process.is_alive() {
            ready[idx] = true;
        }
    }

    Ok(ids
        .into_iter()
        .zip(ready)
        .filter_map(|(id, r)| r.then_some(id))
        .collect())
}
