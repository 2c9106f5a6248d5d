use std::io;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use crossbeam::channel::{after, never, Receiver};
use crossbeam::select;
use nix::sys::signal::Signal;
use tracing::{info, warn};

use super::error::SupervisorError;
use super::exit_code::classify_exit;
use super::signals::SignalSubscription;
use crate::command::{NotStartedProcess, ProcessHandle};

/// Outcome of supervising a child process to termination.
///
/// `exit_code` is meaningful only when `ttl_expired` is false: a TTL-triggered
/// termination is a controlled shutdown and always reports code 0, regardless
/// of how the child actually died once signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisionOutcome {
    pub exit_code: i32,
    pub ttl_expired: bool,
}

/// Supervises exactly one child process under a time-to-live.
///
/// The child is started, then a single event loop waits on three sources: the
/// child's wait outcome, externally received termination signals (forwarded
/// verbatim to the child), and the TTL timer. TTL expiry escalates from
/// SIGTERM to SIGKILL after the shutdown grace elapses; a zero grace skips
/// straight to SIGKILL.
pub struct Supervisor {
    ttl: Duration,
    shutdown_grace: Duration,
}

impl Supervisor {
    pub fn new(ttl: Duration, shutdown_grace: Duration) -> Self {
        Self { ttl, shutdown_grace }
    }

    /// Starts the child and blocks until it has terminated by any means.
    ///
    /// Consumes the supervisor: one child per instance. Returns an error if
    /// the child cannot be launched or if the wait on it fails outside the
    /// TTL path.
    pub fn run(self, process: NotStartedProcess) -> Result<SupervisionOutcome, SupervisorError> {
        let signals =
            SignalSubscription::subscribe().map_err(SupervisorError::SignalSubscription)?;

        let started = process.start().map_err(SupervisorError::Start)?;
        info!(
            pid = started.pid(),
            program = started.program(),
            ttl = ?self.ttl,
            "started child process"
        );

        let handle = started.watch();
        self.event_loop(&handle, &signals)
        // `signals` drops here, unregistering the process-level handlers.
    }

    fn event_loop(
        &self,
        process: &ProcessHandle,
        signals: &SignalSubscription,
    ) -> Result<SupervisionOutcome, SupervisorError> {
        let started_at = Instant::now();
        let ttl_fire = after(self.ttl);
        // Armed only once the TTL has expired; dropped on every exit path.
        let mut grace_fire: Receiver<Instant> = never();
        let mut signal_events = signals.receiver().clone();
        let mut ttl_expired = false;

        loop {
            select! {
                recv(process.done().as_ref()) -> outcome => {
                    let outcome = outcome.unwrap_or_else(|_| {
                        Err(io::Error::other("wait outcome conduit closed before child exit"))
                    });
                    return self.handle_process_exit(process, outcome, ttl_expired, started_at);
                }
                recv(signal_events) -> received => {
                    match received {
                        Ok(signal) => self.forward_signal(process, signal),
                        Err(_) => {
                            warn!("signal conduit closed; no further signals will be forwarded");
                            signal_events = never();
                        }
                    }
                }
                recv(ttl_fire) -> _ => {
                    ttl_expired = true;
                    info!(
                        pid = process.pid(),
                        grace = ?self.shutdown_grace,
                        "ttl expired; sending SIGTERM to child"
                    );
                    self.deliver(process, Signal::SIGTERM);

                    if self.shutdown_grace.is_zero() {
                        info!(pid = process.pid(), "shutdown grace is zero; sending SIGKILL immediately");
                        self.deliver(process, Signal::SIGKILL);
                    } else {
                        grace_fire = after(self.shutdown_grace);
                    }
                }
                recv(grace_fire) -> _ => {
                    info!(pid = process.pid(), "shutdown grace elapsed; sending SIGKILL to child");
                    self.deliver(process, Signal::SIGKILL);
                    grace_fire = never();
                }
            }
        }
    }

    fn handle_process_exit(
        &self,
        process: &ProcessHandle,
        outcome: io::Result<ExitStatus>,
        ttl_expired: bool,
        started_at: Instant,
    ) -> Result<SupervisionOutcome, SupervisorError> {
        if ttl_expired {
            // TTL expiry is this wrapper's own decision: report a controlled
            // shutdown no matter how the child actually went down.
            info!(
                pid = process.pid(),
                elapsed = ?started_at.elapsed(),
                "child exited after ttl expiry"
            );
            return Ok(SupervisionOutcome {
                exit_code: 0,
                ttl_expired: true,
            });
        }

        let exit_code = classify_exit(outcome)?;
        info!(
            pid = process.pid(),
            exit_code,
            elapsed = ?started_at.elapsed(),
            "child process exited"
        );

        Ok(SupervisionOutcome {
            exit_code,
            ttl_expired: false,
        })
    }

    fn forward_signal(&self, process: &ProcessHandle, raw: i32) {
        match Signal::try_from(raw) {
            Ok(signal) => {
                info!(pid = process.pid(), signal = ?signal, "forwarding signal to child");
                self.deliver(process, signal);
            }
            Err(_) => warn!(signal = raw, "received unknown signal number; not forwarded"),
        }
    }

    fn deliver(&self, process: &ProcessHandle, signal: Signal) {
        if let Err(err) = process.signal(signal) {
            warn!(
                pid = process.pid(),
                signal = ?signal,
                "failed to deliver signal to child: {err}"
            );
        }
    }
}
