mod error;
mod exit_code;
mod signals;
#[allow(clippy::module_inception)]
mod supervisor;

pub use crate::supervisor::error::SupervisorError;
pub use crate::supervisor::signals::SignalSubscription;
pub use crate::supervisor::supervisor::{SupervisionOutcome, Supervisor};
