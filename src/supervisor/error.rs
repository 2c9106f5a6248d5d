use thiserror::Error;

use crate::command::CommandError;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("start child process: {0}")]
    Start(#[source] CommandError),

    #[error("register signal handlers: {0}")]
    SignalSubscription(#[source] std::io::Error),

    #[error("child process wait failed: {0}")]
    Wait(#[source] std::io::Error),
}
