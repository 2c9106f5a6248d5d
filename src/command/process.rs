use std::ffi::OsStr;
use std::io;
use std::process::{Child, Command, ExitStatus};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::debug;

use super::error::CommandError;
use crate::event::channel::{pub_sub_bounded, EventConsumer};
use crate::utils::threads::spawn_named_thread;

////////////////////////////////////////////////////////////////////////////////////
// States for Started/Not Started process
////////////////////////////////////////////////////////////////////////////////////

pub struct NotStartedProcess {
    cmd: Command,
    program: String,
}

pub struct StartedProcess {
    child: Child,
    program: String,
}

/// Addressable view of a running child once its blocking wait has been moved
/// to the background waiter thread. Holds only the pid and the single-slot
/// done conduit; the waiter owns the [`Child`].
pub struct ProcessHandle {
    pid: u32,
    program: String,
    done: EventConsumer<io::Result<ExitStatus>>,
}

impl NotStartedProcess {
    /// Prepares a child process with inherited stdio, so the supervised
    /// service's own output reaches the container logs unchanged.
    pub fn new<I, S>(program: impl AsRef<OsStr>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program.as_ref());
        cmd.args(args);

        Self {
            cmd,
            program: program.as_ref().to_string_lossy().into_owned(),
        }
    }

    pub fn start(mut self) -> Result<StartedProcess, CommandError> {
        let child = self.cmd.spawn().map_err(CommandError::Spawn)?;
        Ok(StartedProcess {
            child,
            program: self.program,
        })
    }
}

impl StartedProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Hands the child to a named background thread that blocks on its
    /// termination and publishes the wait outcome exactly once.
    pub fn watch(self) -> ProcessHandle {
        let (publisher, consumer) = pub_sub_bounded(1);
        let pid = self.pid();
        let program = self.program;
        let mut child = self.child;

        spawn_named_thread("process-waiter", move || {
            let outcome = child.wait();
            if publisher.publish(outcome).is_err() {
                debug!(pid, "wait outcome dropped; supervising side already gone");
            }
        });

        ProcessHandle {
            pid,
            program,
            done: consumer,
        }
    }
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Wait outcome of the child, published once by the waiter thread.
    pub fn done(&self) -> &EventConsumer<io::Result<ExitStatus>> {
        &self.done
    }

    pub fn signal(&self, signal: Signal) -> Result<(), CommandError> {
        signal::kill(Pid::from_raw(self.pid as i32), signal)
            .map_err(|err| CommandError::NixError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    #[test]
    fn start_unknown_binary_fails() {
        let process = NotStartedProcess::new("this-binary-does-not-exist", Vec::<String>::new());
        assert_matches!(process.start(), Err(CommandError::Spawn(_)));
    }

    #[test]
    fn watch_publishes_exit_status() {
        let process = NotStartedProcess::new("sh", ["-c", "exit 4"]);
        let handle = process.start().unwrap().watch();

        let outcome = handle
            .done()
            .as_ref()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(Some(4), outcome.unwrap().code());
    }

    #[test]
    fn signal_terminates_child() {
        let process = NotStartedProcess::new("sh", ["-c", "while true; do sleep 0.1; done"]);
        let handle = process.start().unwrap().watch();

        handle.signal(Signal::SIGKILL).unwrap();

        let outcome = handle
            .done()
            .as_ref()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert!(outcome.unwrap().code().is_none());
    }

    #[test]
    fn signal_to_exited_child_fails() {
        let process = NotStartedProcess::new("sh", ["-c", "exit 0"]);
        let handle = process.start().unwrap().watch();

        // Let the waiter reap the child so the pid is gone.
        handle
            .done()
            .as_ref()
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();

        assert_matches!(
            handle.signal(Signal::SIGTERM),
            Err(CommandError::NixError(_))
        );
    }
}
