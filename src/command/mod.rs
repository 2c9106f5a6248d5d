mod error;
mod process;

pub use crate::command::error::CommandError;
pub use crate::command::process::{NotStartedProcess, ProcessHandle, StartedProcess};
