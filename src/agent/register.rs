use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use crossbeam::channel::after;
use crossbeam::select;
use nix::sys::signal::Signal;
use thiserror::Error;
use tracing::{info, warn};

use crate::command::{CommandError, NotStartedProcess};
use crate::provision::Activation;

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("activation credentials not provided")]
    MissingCredentials,

    #[error("start agent registration: {0}")]
    Start(#[source] CommandError),

    #[error("agent registration wait failed: {0}")]
    Wait(#[source] io::Error),

    #[error("agent registration exited unsuccessfully: {0}")]
    Unsuccessful(ExitStatus),

    #[error("agent registration deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Invokes the amazon-ssm-agent binary to register with Systems Manager.
pub fn register_agent(
    agent_path: &str,
    region: &str,
    activation: &Activation,
) -> Result<(), RegisterError> {
    register_agent_with_timeout(agent_path, region, activation, REGISTRATION_TIMEOUT)
}

pub(crate) fn register_agent_with_timeout(
    agent_path: &str,
    region: &str,
    activation: &Activation,
    timeout: Duration,
) -> Result<(), RegisterError> {
    if activation.activation_id.is_empty() || activation.activation_code.is_empty() {
        return Err(RegisterError::MissingCredentials);
    }

    let args = [
        "-register",
        "-code",
        activation.activation_code.as_str(),
        "-id",
        activation.activation_id.as_str(),
        "-region",
        region,
    ];
    let started = NotStartedProcess::new(agent_path, args)
        .start()
        .map_err(RegisterError::Start)?;
    info!(pid = started.pid(), agent_path, "running agent registration");

    let handle = started.watch();
    let deadline = after(timeout);
    let mut timed_out = false;

    // The registration process is always reaped: on deadline expiry it is
    // killed and the loop keeps waiting for its actual exit.
    loop {
        select! {
            recv(handle.done().as_ref()) -> outcome => {
                let outcome = outcome.unwrap_or_else(|_| {
                    Err(io::Error::other("registration wait conduit closed"))
                });
                let status = outcome.map_err(RegisterError::Wait)?;

                if timed_out {
                    return Err(RegisterError::DeadlineExceeded(timeout));
                }

                if !status.success() {
                    return Err(RegisterError::Unsuccessful(status));
                }

                return Ok(());
            }
            recv(deadline) -> _ => {
                warn!(pid = handle.pid(), "agent registration deadline exceeded; killing process");
                timed_out = true;
                if let Err(err) = handle.signal(Signal::SIGKILL) {
                    warn!(pid = handle.pid(), "failed to kill registration process: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Instant;
    use tempfile::TempDir;

    fn fake_agent(script: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amazon-ssm-agent");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    }

    fn activation() -> Activation {
        Activation {
            activation_id: "act-123".to_string(),
            activation_code: "code-456".to_string(),
        }
    }

    #[test]
    fn successful_registration() {
        let (_dir, agent) = fake_agent("exit 0");

        register_agent(agent.to_str().unwrap(), "us-east-1", &activation()).unwrap();
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let (_dir, agent) = fake_agent("exit 0");
        let empty = Activation::default();

        assert_matches!(
            register_agent(agent.to_str().unwrap(), "us-east-1", &empty),
            Err(RegisterError::MissingCredentials)
        );
    }

    #[test]
    fn nonzero_exit_is_unsuccessful() {
        let (_dir, agent) = fake_agent("exit 3");

        assert_matches!(
            register_agent(agent.to_str().unwrap(), "us-east-1", &activation()),
            Err(RegisterError::Unsuccessful(_))
        );
    }

    #[test]
    fn deadline_kills_hung_registration() {
        let (_dir, agent) = fake_agent("sleep 30");
        let started = Instant::now();

        let result = register_agent_with_timeout(
            agent.to_str().unwrap(),
            "us-east-1",
            &activation(),
            Duration::from_millis(200),
        );

        assert_matches!(result, Err(RegisterError::DeadlineExceeded(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_agent_binary_is_a_start_error() {
        assert_matches!(
            register_agent("/does/not/exist/agent", "us-east-1", &activation()),
            Err(RegisterError::Start(_))
        );
    }
}
