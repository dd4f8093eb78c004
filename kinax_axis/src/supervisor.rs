//! Move supervisor.
//!
//! Drives axes to completion by polling them at a fixed interval. The axis
//! lock is held only for the duration of one poll, so status queries and stop
//! requests from other threads are served between polls. Raising the shutdown
//! flag stops every axis being waited on.

use crate::axis::AxisStatus;
use crate::context::AxisHandle;
use kinax_common::axis::error::AxisError;
use kinax_common::axis::state::MoveState;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of waiting on one move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PollStats {
    pub state: MoveState,
    pub polls: u64,
    pub elapsed: Duration,
}

pub struct Supervisor {
    axes: Vec<AxisHandle>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(axes: Vec<AxisHandle>, poll_interval: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            axes,
            poll_interval,
            shutdown,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn find(&self, name: &str) -> Result<&AxisHandle, AxisError> {
        self.axes
            .iter()
            .find(|axis| axis.lock().name() == name)
            .ok_or_else(|| AxisError::InvalidState(format!("unknown axis {name}")))
    }

    /// Start a move of axis `name` and wait for it to settle.
    ///
    /// # Errors
    /// Pre-dispatch rejections from `start`, or the post-dispatch failure that
    /// ended the move.
    pub fn move_to(&self, name: &str, target: f64) -> Result<PollStats, AxisError> {
        let axis = self.find(name)?;
        axis.lock().start(target)?;
        self.wait(axis)
    }

    /// Retry a move that ended in a retryable error, up to `attempts` times.
    pub fn move_with_retry(
        &self,
        name: &str,
        target: f64,
        attempts: u32,
    ) -> Result<PollStats, AxisError> {
        let mut attempt = 1;
        loop {
            match self.move_to(name, target) {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(axis = name, attempt, error = %e, "retrying move");
                    attempt += 1;
                    thread::sleep(self.poll_interval);
                }
                result => return result,
            }
        }
    }

    /// Move several axes concurrently, one thread per axis.
    ///
    /// Results are returned in request order.
    pub fn move_many(&self, requests: &[(&str, f64)]) -> Vec<Result<PollStats, AxisError>> {
        thread::scope(|s| {
            let handles: Vec<_> = requests
                .iter()
                .map(|&(name, target)| s.spawn(move || self.move_to(name, target)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(AxisError::InvalidState("move thread panicked".to_string()))
                    })
                })
                .collect()
        })
    }

    /// Poll `axis` until it leaves the moving states.
    ///
    /// A `Stopped` axis, including one stopped from another thread, is polled
    /// until its members come to rest and it reconciles.
    ///
    /// # Errors
    /// The post-dispatch error that ended the move, or the read error of a
    /// stopped axis. On shutdown the axis is stopped and the resulting state
    /// reported.
    pub fn wait(&self, axis: &AxisHandle) -> Result<PollStats, AxisError> {
        let started = Instant::now();
        let mut polls = 0u64;
        loop {
            if self.is_shutdown() {
                let mut guard = axis.lock();
                info!(axis = %guard.name(), "shutdown requested, stopping");
                guard.stop()?;
                return Ok(PollStats {
                    state: guard.state(),
                    polls,
                    elapsed: started.elapsed(),
                });
            }
            let state = axis.lock().poll()?;
            polls += 1;
            if !state.is_moving() && state != MoveState::Stopped {
                debug!(%state, polls, "move settled");
                return Ok(PollStats {
                    state,
                    polls,
                    elapsed: started.elapsed(),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Stop every axis in parallel.
    ///
    /// # Errors
    /// The first stop failure; every axis is still asked to stop.
    pub fn stop_all(&self) -> Result<(), AxisError> {
        let results: Vec<Result<(), AxisError>> = thread::scope(|s| {
            let handles: Vec<_> = self
                .axes
                .iter()
                .map(|axis| s.spawn(move || axis.lock().stop()))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(AxisError::InvalidState("stop thread panicked".to_string()))
                    })
                })
                .collect()
        });
        results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }

    pub fn status_all(&self) -> Vec<AxisStatus> {
        self.axes.iter().map(|axis| axis.lock().status()).collect()
    }
}
